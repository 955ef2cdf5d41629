use mrgraph::{
    driver::{iteration_path, vertices_path},
    jobs::build_vertices::{run_build_vertices, text_input, CHAIN_VERTICES},
    prelude::*,
    substrate::{BRANCH, CHAIN},
};
use mrgraph_core::utils::logging::global_info_logger;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;

fn decode_all<P: Payload>(store: &impl DatasetStore, dataset: &DatasetRef) -> Vec<VertexRecord<P>> {
    let mut vertices: Vec<VertexRecord<P>> = store
        .read(dataset)
        .unwrap()
        .iter()
        .map(|r| VertexRecord::from_bytes(&r.value, &VertexConfig::default()).unwrap())
        .collect();
    vertices.sort_by_key(|v| v.id());
    vertices
}

fn chain_records(len: VertexId) -> Vec<Record> {
    (0..len)
        .map(|id| {
            let mut v = VertexRecord::new(id, &VertexConfig::default())
                .unwrap()
                .with_payload(Span(1));
            if id + 1 < len {
                v.add_edge_to(id + 1);
            }
            Record::new(id, v.to_bytes(EdgeFormat::OutOnly).unwrap())
        })
        .collect()
}

#[test]
fn text_graph_on_disk() {
    global_info_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = JobConfigBuilder::new()
        .with_input_format(InputFormat::Text)
        .with_from_edges(true)
        .with_num_threads(2)
        .with_shard_size(3)
        .with_seed(2024)
        .build();
    let runner = LocalJobRunner::new(DiskStore::new(dir.path()), config.runner.clone()).unwrap();

    // two chains feeding a branch at 10, which continues into a third chain
    let text = "\
        0;t;1;\n1;t;2;\n2;t;10;\n\
        5;t;6;\n6;t;10;\n\
        10;t;11;\n11;t;12;\n12;t;13;\n13;t;;\n";
    runner
        .store()
        .write("raw", Dataset::from_records(text_input(text)))
        .unwrap();

    let summary = simplify_graph::<NoPayload, _>(
        &runner,
        &config,
        seeded_coins(),
        DatasetRef::all("raw"),
        "simple",
    )
    .unwrap();

    assert_eq!(summary.build.records_in, 9);
    assert_eq!(summary.build.counters.get(CHAIN_VERTICES), 8);
    assert!(summary.compression.converged);
    let rounds = &summary.compression.compressions_per_iteration;
    assert!(rounds.ends_with(&[0, 0]));

    let branches = decode_all::<NoPayload>(runner.store(), &DatasetRef::stream(vertices_path("simple"), BRANCH));
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].id(), 10);
    assert_eq!(branches[0].in_edges().as_slice(), &[2, 6]);

    let out = decode_all::<NoPayload>(runner.store(), &DatasetRef::all("simple"));
    assert_eq!(out.len() as u64 + summary.compression.total_compressions, 8);
    let ids: Vec<_> = out.iter().map(|v| v.id()).collect();
    // heads and ends of chains are never absorbed
    for id in [0, 5, 11, 13] {
        assert!(ids.contains(&id), "{id} missing from {ids:?}");
    }

    assert!(dir.path().join("simple").is_dir());
    for i in 0..summary.compression.iterations {
        assert!(!dir.path().join(iteration_path("simple", i)).exists());
    }
}

#[test]
fn build_output_can_be_read_back_as_text() {
    let runner = LocalJobRunner::new(MemStore::new(), JobConfig::default().runner).unwrap();
    runner.store().put("raw", chain_records(3)).unwrap();
    let config = JobConfigBuilder::new().with_from_edges(true).build();
    run_build_vertices::<Span, _>(&runner, &config, DatasetRef::all("raw"), "built").unwrap();

    let lines: Vec<String> = decode_all::<Span>(runner.store(), &DatasetRef::stream("built", "part"))
        .iter()
        .map(|v| v.to_key_value_line(EdgeFormat::OutAndIn))
        .collect();
    assert_eq!(
        lines,
        vec![
            "0\t0;b;1;;00000001".to_string(),
            "1\t1;b;2;0;00000001".to_string(),
            "2\t2;b;;1;00000001".to_string(),
        ]
    );
}

#[test]
fn chain_partition_is_empty_for_a_fully_branched_graph() {
    let runner = LocalJobRunner::new(MemStore::new(), JobConfig::default().runner).unwrap();
    let star: Vec<Record> = [(0, vec![1, 2]), (1, vec![0, 2]), (2, vec![0, 1])]
        .into_iter()
        .map(|(id, to)| {
            let mut v: VertexRecord = VertexRecord::new(id, &VertexConfig::default()).unwrap();
            for t in to {
                v.add_edge_to(t);
            }
            Record::new(id, v.to_bytes(EdgeFormat::OutOnly).unwrap())
        })
        .collect();
    runner.store().put("raw", star).unwrap();
    let config = JobConfig::default();
    let summary = simplify_graph::<NoPayload, _>(
        &runner,
        &config,
        seeded_coins(),
        DatasetRef::all("raw"),
        "simple",
    )
    .unwrap();
    assert_eq!(summary.compression.total_compressions, 0);
    assert_eq!(summary.compression.iterations, 2);
    assert!(runner.store().read(&DatasetRef::all("simple")).unwrap().is_empty());
    assert_eq!(
        runner
            .store()
            .read(&DatasetRef::stream(vertices_path("simple"), CHAIN))
            .unwrap()
            .len(),
        0
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_compression_preserves_the_chain(len in 1i32..40, seed in any::<u64>(), reducers in 1usize..5) {
        let config = JobConfigBuilder::new()
            .with_seed(seed)
            .with_num_reducers(reducers)
            .with_shard_size(7)
            .build();
        let runner = LocalJobRunner::new(MemStore::new(), config.runner.clone()).unwrap();
        runner.store().put("in", chain_records(len)).unwrap();

        let summary = CompressionDriver::new(&runner, config)
            .run::<Span>(DatasetRef::all("in"), "out")
            .unwrap();
        let out = decode_all::<Span>(runner.store(), &DatasetRef::all("out"));

        prop_assert!(summary.converged);
        prop_assert_eq!(out.len() as u64 + summary.total_compressions, len as u64);
        prop_assert_eq!(
            summary.compressions_per_iteration.iter().sum::<u64>(),
            summary.total_compressions
        );

        // spans still account for every original vertex
        let span: u32 = out.iter().map(|v| v.payload().vertices()).sum();
        prop_assert_eq!(span, len as u32);

        // walking tails from the head visits every survivor and ends at the tail
        let by_id: HashMap<VertexId, &VertexRecord<Span>> = out.iter().map(|v| (v.id(), v)).collect();
        let mut current = 0;
        let mut visited = 1;
        while let Some(tail) = by_id[&current].tail() {
            prop_assert_eq!(tail.multiplicity, 1);
            current = tail.id;
            visited += 1;
        }
        prop_assert_eq!(current, len - 1);
        prop_assert_eq!(visited, out.len());
    }
}
