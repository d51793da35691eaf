//! In-memory windowed counting.
//!
//! Storage adapters stream the matching rows of the request log through a
//! [`BucketCounter`] instead of relying on a backend-specific grouping query,
//! so every backend produces identical `(identity, bucket) -> count` maps.

use std::collections::HashMap;

use crate::types::{BucketCount, Timestamp};

#[derive(Debug)]
pub struct BucketCounter {
	resolution_ms: i64,
	counts: HashMap<(Box<str>, i64), u64>,
}

impl BucketCounter {
	pub fn new(resolution_ms: i64) -> Self {
		Self { resolution_ms: resolution_ms.max(1), counts: HashMap::new() }
	}

	pub fn add(&mut self, identity: &str, timestamp: Timestamp) {
		let bucket = timestamp.bucket(self.resolution_ms);
		*self.counts.entry((Box::from(identity), bucket)).or_insert(0) += 1;
	}

	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Buckets sorted by identity, then bucket index
	pub fn into_counts(self) -> Vec<BucketCount> {
		let mut res: Vec<BucketCount> = self
			.counts
			.into_iter()
			.map(|((identity, bucket), count)| BucketCount { identity, bucket, count })
			.collect();
		res.sort_by(|a, b| a.identity.cmp(&b.identity).then(a.bucket.cmp(&b.bucket)));
		res
	}
}


// vim: ts=4
