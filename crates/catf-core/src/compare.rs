//! Recursive comparison of container pairs.
//!
//! Each container pair is unpacked into its staging location, the two trees
//! are diffed, and every differing pair that is itself a container is
//! compared the same way. Sibling containers are compared on the rayon pool;
//! their outcomes are merged in input order, so results do not depend on
//! scheduling.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::CompareConfig;
use crate::CompareError;
use crate::FailurePolicy;
use crate::Result;
use crate::deadline::Deadline;
use crate::formats::FormatTag;
use crate::formats::ImageVariant;
use crate::formats::classify;
use crate::report::ProgressCallback;
use crate::resolve::PathResolver;
use crate::staging::ROOT_NAMESPACE;
use crate::staging::StagingArea;
use crate::tools::DiffBackend;
use crate::tools::FormatHandler;
use crate::types::ArtifactPair;
use crate::types::ComparisonNode;
use crate::types::FilePair;
use crate::types::LeafDifference;
use crate::types::LogicalPath;
use crate::types::UncomparablePair;

/// Everything found below one node.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    /// Leaf differences, in discovery order.
    pub leaves: Vec<LeafDifference>,
    /// Pairs that could not be compared.
    pub uncomparable: Vec<UncomparablePair>,
    /// Application bundles encountered, by logical path. Their signature
    /// files are rendered from the bundles themselves.
    pub bundles: BTreeMap<LogicalPath, FilePair>,
}

impl NodeOutcome {
    /// Appends another outcome after this one.
    pub fn merge(&mut self, other: Self) {
        self.leaves.extend(other.leaves);
        self.uncomparable.extend(other.uncomparable);
        self.bundles.extend(other.bundles);
    }

    fn leaf(logical_path: LogicalPath, pair: FilePair) -> Self {
        Self {
            leaves: vec![LeafDifference::new(logical_path, pair)],
            ..Self::default()
        }
    }

    fn uncomparable(logical_path: LogicalPath, pair: FilePair, reason: String) -> Self {
        Self {
            uncomparable: vec![UncomparablePair {
                logical_path,
                pair,
                reason,
            }],
            ..Self::default()
        }
    }
}

/// Drives classification, extraction and recursion.
pub struct Comparator<'a> {
    config: &'a CompareConfig,
    handler: &'a dyn FormatHandler,
    backend: &'a dyn DiffBackend,
    staging: &'a StagingArea,
    resolver: &'a PathResolver,
    deadline: Deadline,
    progress: &'a dyn ProgressCallback,
}

impl<'a> Comparator<'a> {
    /// Creates a comparator over shared run state.
    #[must_use]
    pub fn new(
        config: &'a CompareConfig,
        handler: &'a dyn FormatHandler,
        backend: &'a dyn DiffBackend,
        staging: &'a StagingArea,
        resolver: &'a PathResolver,
        deadline: Deadline,
        progress: &'a dyn ProgressCallback,
    ) -> Self {
        Self {
            config,
            handler,
            backend,
            staging,
            resolver,
            deadline,
            progress,
        }
    }

    /// Compares the two top-level artifacts.
    ///
    /// # Errors
    ///
    /// - [`CompareError::NotAContainer`] if the artifacts cannot be unpacked
    /// - any error unpacking or diffing the artifacts themselves
    /// - [`CompareError::Uncomparable`] for a nested failure under
    ///   [`FailurePolicy::Abort`]
    pub fn compare_root(&self, artifacts: &ArtifactPair) -> Result<NodeOutcome> {
        let pair = artifacts.files();
        let format = classify(&pair, self.backend, &self.config.image_rules)?;
        if format.strategy().is_none() {
            return Err(CompareError::NotAContainer { path: pair.first });
        }
        let node = ComparisonNode {
            pair,
            logical_path: LogicalPath::root(),
            format,
            depth: 0,
        };
        self.expand(&node, ROOT_NAMESPACE)
    }

    fn visit(&self, pair: FilePair, logical_path: LogicalPath, depth: usize) -> Result<NodeOutcome> {
        if let Err(err) = self.deadline.check() {
            return self.failed(logical_path, pair, &err);
        }

        let format = classify(&pair, self.backend, &self.config.image_rules)?;
        match format {
            FormatTag::PlainText | FormatTag::Unsupported => {
                return Ok(NodeOutcome::leaf(logical_path, pair));
            }
            FormatTag::Image(ImageVariant::Skipped) => {
                debug!(path = %logical_path, "skipping image");
                return Ok(NodeOutcome::default());
            }
            _ => {}
        }

        if depth > self.config.max_depth {
            let err = CompareError::DepthExceeded {
                max: self.config.max_depth,
                path: pair.first.clone(),
            };
            return self.failed(logical_path, pair, &err);
        }

        let node = ComparisonNode {
            pair,
            logical_path,
            format,
            depth,
        };
        match self.expand(&node, format.namespace()) {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_recoverable() => self.failed(node.logical_path, node.pair, &err),
            Err(err) => Err(err),
        }
    }

    fn failed(&self, logical_path: LogicalPath, pair: FilePair, err: &CompareError) -> Result<NodeOutcome> {
        warn!(path = %logical_path, error = %err, "files could not be compared");
        if self.config.failure_policy == FailurePolicy::Abort {
            return Err(CompareError::Uncomparable {
                first: pair.first,
                second: pair.second,
                reason: err.to_string(),
            });
        }
        Ok(NodeOutcome::uncomparable(logical_path, pair, err.to_string()))
    }

    fn expand(&self, node: &ComparisonNode, namespace: &str) -> Result<NodeOutcome> {
        let mut outcome = NodeOutcome::default();
        let Some(strategy) = node.format.strategy() else {
            return Ok(outcome);
        };
        let Some(location) = self.staging.claim(namespace, &node.logical_path)? else {
            debug!(path = %node.logical_path, "already compared during this run");
            return Ok(outcome);
        };

        info!(path = %node.logical_path, format = strategy.name(), "comparing");
        self.progress.on_node_start(&node.logical_path, node.depth);
        if node.format == FormatTag::Bundle {
            outcome
                .bundles
                .insert(node.logical_path.clone(), node.pair.clone());
        }

        self.resolver
            .register(&location.first, node.logical_path.clone());
        self.resolver
            .register(&location.second, node.logical_path.clone());

        if location.is_complete() {
            debug!(path = %node.logical_path, "reusing previous extraction");
        } else {
            location.reset()?;
            strategy.unpack(&node.pair, &location, self.handler)?;
            location.mark_complete()?;
        }
        self.deadline.check()?;

        let mut containers = Vec::new();
        for pair in self
            .backend
            .diff_directories(&location.first, &location.second)?
        {
            let logical = self.resolver.child_path(&node.logical_path, &pair.first);
            let extractable = pair.both_regular_files()
                && FormatTag::from_path(&pair.first, &self.config.image_rules).is_container();
            if extractable {
                containers.push((pair, logical));
            } else {
                outcome.leaves.push(LeafDifference::new(logical, pair));
            }
        }

        let depth = node.depth + 1;
        let children = containers
            .into_par_iter()
            .map(|(pair, logical)| self.visit(pair, logical, depth))
            .collect::<Result<Vec<_>>>()?;
        for child in children {
            outcome.merge(child);
        }

        self.progress
            .on_node_complete(&node.logical_path, outcome.leaves.len());
        Ok(outcome)
    }
}
