//! Random bits for the compression mapper.
//!
//! Coins are injected so that tests can script the protocol; production
//! runs use [`RngCoin`] seeded from the map task's context.

use crate::substrate::TaskContext;
use mrgraph_core::entities::VertexId;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{collections::VecDeque, sync::Arc};

pub trait CoinSource: Send {
    /// One fair coin flip for `vertex`.
    fn flip(&mut self, vertex: VertexId) -> bool;
}

pub struct RngCoin(StdRng);

impl RngCoin {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl CoinSource for RngCoin {
    fn flip(&mut self, _vertex: VertexId) -> bool {
        self.0.gen()
    }
}

/// Replays a fixed sequence of flips, then keeps answering `fallback`.
pub struct ScriptedCoin {
    flips: VecDeque<bool>,
    fallback: bool,
}

impl ScriptedCoin {
    pub fn new(flips: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            flips: flips.into_iter().collect(),
            fallback,
        }
    }
}

impl CoinSource for ScriptedCoin {
    fn flip(&mut self, _vertex: VertexId) -> bool {
        self.flips.pop_front().unwrap_or(self.fallback)
    }
}

/// Decides every flip from the vertex id alone.
pub struct FnCoin<F>(pub F);

impl<F: FnMut(VertexId) -> bool + Send> CoinSource for FnCoin<F> {
    fn flip(&mut self, vertex: VertexId) -> bool {
        (self.0)(vertex)
    }
}

/// Builds the coin of one map task.
pub type CoinFactory = Arc<dyn Fn(&TaskContext) -> Box<dyn CoinSource> + Send + Sync>;

pub fn seeded_coins() -> CoinFactory {
    Arc::new(|ctx: &TaskContext| Box::new(RngCoin::seeded(ctx.seed)) as Box<dyn CoinSource>)
}

/// Every task gets the same deterministic coin.
pub fn fn_coins<F>(f: F) -> CoinFactory
where
    F: Fn(VertexId) -> bool + Clone + Send + Sync + 'static,
{
    Arc::new(move |_: &TaskContext| Box::new(FnCoin(f.clone())) as Box<dyn CoinSource>)
}
