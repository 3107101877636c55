//! Ownership of the single live digest context of a run.
//!
//! Building a multi-algorithm context is not free, so one context is kept and
//! reused across files. Reuse is only correct when either the context is
//! reset between independent files or the accumulated state is wanted, as in
//! batch mode where many files contribute to one torrent.

use log::{debug, trace, warn};

use crate::algorithm::{AlgorithmId, AlgorithmSet, MAX_ALGORITHMS};
use crate::engine::{DigestContext, DigestEngine, Digests};
use crate::error::HashpassError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Every file gets an independent digest.
    PerFile,
    /// Files accumulate into one context until explicitly finalized.
    Batch,
}

/// What [`DigestSession::acquire`] did to provide the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// A new context was initialized.
    Fresh,
    /// The live context was reset and reused.
    Reset,
    /// The live context was reused as is (batch mode).
    Continued,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub inits: u64,
    pub resets: u64,
    pub continues: u64,
}

pub struct DigestSession<E: DigestEngine> {
    engine: E,
    context: Option<E::Context>,
    active: AlgorithmSet,
    ids: Vec<AlgorithmId>,
    mode: SessionMode,
    stats: SessionStats,
}

impl<E: DigestEngine> DigestSession<E> {
    pub fn new(engine: E, mode: SessionMode) -> Self {
        Self {
            engine,
            context: None,
            active: AlgorithmSet::EMPTY,
            ids: Vec::new(),
            mode,
            stats: SessionStats::default(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_live(&self) -> bool {
        self.context.is_some()
    }

    /// Algorithm set of the live context.
    pub fn active(&self) -> Option<AlgorithmSet> {
        self.context.as_ref().map(|_| self.active)
    }

    pub fn context(&self) -> Option<&E::Context> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut E::Context> {
        self.context.as_mut()
    }

    /// Provide a context ready to digest a file needing `requested`.
    ///
    /// - no live context: initialize one;
    /// - same set, batch mode: reuse without reset;
    /// - same set, per-file mode: reset, then reuse;
    /// - different set: drop the old context and initialize a new one.
    pub fn acquire(
        &mut self,
        requested: AlgorithmSet,
    ) -> Result<(Acquired, &mut E::Context), HashpassError> {
        if self.context.is_some() && self.active != requested {
            if self.mode == SessionMode::Batch {
                warn!(
                    "algorithm set changed from [{}] to [{}], accumulated batch state is dropped",
                    self.active, requested
                );
            } else {
                debug!("algorithm set changed from [{}] to [{}]", self.active, requested);
            }
            self.context = None;
        }

        let acquired = if let Some(ctx) = self.context.as_mut() {
            match self.mode {
                SessionMode::Batch => {
                    self.stats.continues += 1;
                    trace!("continuing batch context");
                    Acquired::Continued
                }
                SessionMode::PerFile => {
                    ctx.reset();
                    self.stats.resets += 1;
                    trace!("reset digest context");
                    Acquired::Reset
                }
            }
        } else {
            if AlgorithmSet::from_identifier_list(&self.ids) != requested {
                self.ids = requested.to_identifier_list(MAX_ALGORITHMS)?;
            }
            let ctx = self
                .engine
                .init_multi(&self.ids)
                .ok_or_else(|| HashpassError::EngineInit(requested.to_string()))?;
            self.context = Some(ctx);
            self.active = requested;
            self.stats.inits += 1;
            Acquired::Fresh
        };

        let ctx = self
            .context
            .as_mut()
            .ok_or_else(|| HashpassError::Internal("digest context vanished".into()))?;
        Ok((acquired, ctx))
    }

    /// Finish the live context, e.g. at the end of a batch.
    pub fn finalize(&mut self) -> Option<Digests> {
        self.context.as_mut().map(|ctx| ctx.finalize())
    }

    /// Drop the live context.
    pub fn clear(&mut self) {
        self.context = None;
        self.active = AlgorithmSet::EMPTY;
    }
}
