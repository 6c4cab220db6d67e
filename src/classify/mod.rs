//! Boundary to an external description-logic reasoner.
//!
//! The core never runs classification itself. It translates stated
//! definitions into axioms, hands them across the [`Reasoner`] trait, and
//! consumes the result. Commit-stream reactions are explicit message
//! passing: semantic-change events flow over a bounded channel into a
//! [`ClassifierState`] that decides how much reclassification the next run
//! needs. Chronicle state is only touched after the external task reports
//! success.

use std::collections::BTreeSet;

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use thiserror::Error;

use crate::core::{
    ChronologyStore, LatestVersion, Nid, StampCoordinate, StampService, VersionPayload,
};
use crate::error::{Effect, Transience};
use crate::logic::LogicalExpression;

/// Classifier boundary failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReasonerError {
    #[error("classify() called before load_axioms()")]
    NotLoaded,
    #[error("semantic change feed is full ({capacity} events pending)")]
    FeedFull { capacity: usize },
    #[error("semantic change feed is disconnected")]
    FeedDisconnected,
    #[error("external reasoner failed: {message}")]
    External { message: String },
}

impl ReasonerError {
    pub fn transience(&self) -> Transience {
        match self {
            ReasonerError::NotLoaded => Transience::Permanent,
            ReasonerError::FeedFull { .. } => Transience::Retryable,
            ReasonerError::FeedDisconnected => Transience::Permanent,
            ReasonerError::External { .. } => Transience::Unknown,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            ReasonerError::External { .. } => Effect::Unknown,
            _ => Effect::None,
        }
    }
}

/// One axiom handed to the reasoner: a concept and its stated definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Axiom {
    pub concept: Nid,
    pub definition: LogicalExpression,
}

/// Classified ontology view returned by the reasoner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReasonerResult {
    /// Concepts the reasoner proved equivalent, grouped.
    pub equivalent_sets: Vec<BTreeSet<Nid>>,
    /// Concepts whose inferred position changed since the previous run.
    pub affected: BTreeSet<Nid>,
}

/// Contract with the external reasoner.
pub trait Reasoner {
    fn load_axioms(&mut self, axioms: &[Axiom]) -> Result<(), ReasonerError>;
    fn classify(&mut self) -> Result<ReasonerResult, ReasonerError>;
    fn is_classified(&self) -> bool;
}

/// How much work the next classification run needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationMode {
    /// Only added/changed axioms need reclassification.
    Incremental,
    /// Full reclassification. Any retirement forces this: the reasoner
    /// cannot incrementally retract an axiom it already absorbed.
    Complete,
}

/// A semantic changed in the store. Published at commit time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemanticChange {
    Added { nid: Nid },
    Changed { nid: Nid },
    Retired { nid: Nid },
}

impl SemanticChange {
    pub fn nid(&self) -> Nid {
        match self {
            SemanticChange::Added { nid }
            | SemanticChange::Changed { nid }
            | SemanticChange::Retired { nid } => *nid,
        }
    }
}

/// Bounded feed of semantic-change events.
///
/// Producers hold cloned senders; the [`ClassifierState`] owns the receiving
/// end. A full feed is backpressure, not data loss: the publisher gets an
/// error and retries after the classifier drains.
pub struct ChangeFeed {
    sender: Sender<SemanticChange>,
    capacity: usize,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> (ChangeFeed, Receiver<SemanticChange>) {
        let (sender, receiver) = bounded(capacity);
        (ChangeFeed { sender, capacity }, receiver)
    }

    pub fn publish(&self, change: SemanticChange) -> Result<(), ReasonerError> {
        self.sender.try_send(change).map_err(|e| match e {
            TrySendError::Full(_) => ReasonerError::FeedFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => ReasonerError::FeedDisconnected,
        })
    }

    pub fn sender(&self) -> Sender<SemanticChange> {
        self.sender.clone()
    }
}

/// Drains the change feed and drives the reasoner.
///
/// Pending change sets survive a failed run untouched, so a retry sees the
/// same work plus whatever arrived meanwhile.
pub struct ClassifierState {
    receiver: Receiver<SemanticChange>,
    added: BTreeSet<Nid>,
    changed: BTreeSet<Nid>,
    retired: BTreeSet<Nid>,
    runs: u64,
}

impl ClassifierState {
    pub fn new(receiver: Receiver<SemanticChange>) -> Self {
        Self {
            receiver,
            added: BTreeSet::new(),
            changed: BTreeSet::new(),
            retired: BTreeSet::new(),
            runs: 0,
        }
    }

    /// Pull every queued event into the pending sets. Non-blocking.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(SemanticChange::Added { nid }) => {
                    self.added.insert(nid);
                    drained += 1;
                }
                Ok(SemanticChange::Changed { nid }) => {
                    self.changed.insert(nid);
                    drained += 1;
                }
                Ok(SemanticChange::Retired { nid }) => {
                    self.retired.insert(nid);
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    pub fn has_pending(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.retired.is_empty()
    }

    /// Nids the pending change sets touch.
    pub fn pending_nids(&self) -> BTreeSet<Nid> {
        let mut all = BTreeSet::new();
        all.extend(&self.added);
        all.extend(&self.changed);
        all.extend(&self.retired);
        all
    }

    /// Any retirement forces a complete run; a first run is always complete.
    pub fn mode(&self) -> ClassificationMode {
        if self.runs == 0 || !self.retired.is_empty() {
            ClassificationMode::Complete
        } else {
            ClassificationMode::Incremental
        }
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Load `axioms` and classify. Pending state is cleared only after the
    /// external task succeeds.
    pub fn classify_with(
        &mut self,
        reasoner: &mut dyn Reasoner,
        axioms: &[Axiom],
    ) -> Result<ReasonerResult, ReasonerError> {
        let mode = self.mode();
        tracing::debug!(
            axioms = axioms.len(),
            pending = self.pending_nids().len(),
            ?mode,
            "classification run starting"
        );
        reasoner.load_axioms(axioms)?;
        let result = reasoner.classify()?;
        self.added.clear();
        self.changed.clear();
        self.retired.clear();
        self.runs += 1;
        tracing::debug!(affected = result.affected.len(), "classification run finished");
        Ok(result)
    }
}

/// Translate every stated definition in `logic_assemblage`, as seen through
/// `coordinate`, into axioms. Contradicted definitions are logged and
/// skipped, matching taxonomy snapshot behavior.
pub fn stated_axioms(
    store: &ChronologyStore,
    stamps: &StampService,
    coordinate: &StampCoordinate,
    logic_assemblage: Nid,
) -> Vec<Axiom> {
    let mut axioms = Vec::new();
    for nid in store.semantics_in_assemblage(logic_assemblage) {
        let Some(chronology) = store.get(nid) else {
            continue;
        };
        let Some(concept) = chronology.referenced_component() else {
            continue;
        };
        match chronology.latest_version(coordinate, stamps) {
            LatestVersion::Absent => {}
            LatestVersion::Contradiction(versions) => {
                tracing::warn!(
                    nid = nid.value(),
                    contenders = versions.len(),
                    "contradicted definition excluded from axiom set"
                );
            }
            LatestVersion::One(version) => {
                if let VersionPayload::LogicGraph(definition) = version.payload() {
                    axioms.push(Axiom {
                        concept,
                        definition: definition.clone(),
                    });
                }
            }
        }
    }
    axioms
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reasoner double that records calls and can be told to fail.
    #[derive(Default)]
    struct ScriptedReasoner {
        loaded: Vec<Axiom>,
        classified: bool,
        fail_next_classify: bool,
    }

    impl Reasoner for ScriptedReasoner {
        fn load_axioms(&mut self, axioms: &[Axiom]) -> Result<(), ReasonerError> {
            self.loaded = axioms.to_vec();
            Ok(())
        }

        fn classify(&mut self) -> Result<ReasonerResult, ReasonerError> {
            if self.fail_next_classify {
                self.fail_next_classify = false;
                return Err(ReasonerError::External {
                    message: "scripted failure".into(),
                });
            }
            self.classified = true;
            Ok(ReasonerResult {
                equivalent_sets: Vec::new(),
                affected: self.loaded.iter().map(|a| a.concept).collect(),
            })
        }

        fn is_classified(&self) -> bool {
            self.classified
        }
    }

    #[test]
    fn feed_applies_backpressure_when_full() {
        let (feed, _receiver) = ChangeFeed::new(1);
        feed.publish(SemanticChange::Added { nid: Nid(1) }).unwrap();
        let err = feed
            .publish(SemanticChange::Added { nid: Nid(2) })
            .unwrap_err();
        assert!(matches!(err, ReasonerError::FeedFull { capacity: 1 }));
        assert!(err.transience().is_retryable());
    }

    #[test]
    fn retirement_forces_complete_mode() {
        let (feed, receiver) = ChangeFeed::new(8);
        let mut state = ClassifierState::new(receiver);
        let mut reasoner = ScriptedReasoner::default();

        // First run is always complete.
        assert_eq!(state.mode(), ClassificationMode::Complete);
        state.classify_with(&mut reasoner, &[]).unwrap();

        feed.publish(SemanticChange::Added { nid: Nid(1) }).unwrap();
        assert_eq!(state.drain(), 1);
        assert_eq!(state.mode(), ClassificationMode::Incremental);

        feed.publish(SemanticChange::Retired { nid: Nid(2) }).unwrap();
        state.drain();
        assert_eq!(state.mode(), ClassificationMode::Complete);
    }

    #[test]
    fn pending_state_survives_failed_run() {
        let (feed, receiver) = ChangeFeed::new(8);
        let mut state = ClassifierState::new(receiver);
        let mut reasoner = ScriptedReasoner {
            fail_next_classify: true,
            ..Default::default()
        };

        feed.publish(SemanticChange::Changed { nid: Nid(7) }).unwrap();
        state.drain();
        assert!(state.classify_with(&mut reasoner, &[]).is_err());
        assert!(state.has_pending());
        assert_eq!(state.pending_nids(), BTreeSet::from([Nid(7)]));

        state.classify_with(&mut reasoner, &[]).unwrap();
        assert!(!state.has_pending());
        assert!(reasoner.is_classified());
        assert_eq!(state.runs(), 1);
    }
}
