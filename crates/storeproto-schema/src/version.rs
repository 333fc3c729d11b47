//! Connection-level capability records.
//!
//! Each protocol family carries one version record: its own revision in
//! `version` and one counter per gated feature. Records received from a peer
//! newer than this build are clamped, so every gated feature reads as
//! unsupported instead of being guessed at.

use std::cmp::Ordering;
use std::fmt;

use crate::context::Context;
use crate::error::Result;
use crate::message::Record;

/// Counter value meaning "feature absent / not understood".
pub const UNSUPPORTED: u32 = u32::MAX;

pub trait VersionRecord: Record + Clone + PartialEq + fmt::Debug {
    /// Family the record belongs to, for diagnostics.
    const FAMILY: &'static str;

    /// Highest record revision this build understands.
    const LOCAL_MAX_VERSION: u32;

    /// The record this build advertises.
    fn local() -> Self;

    fn version(&self) -> u32;

    /// Feature counters by name, in tag order. `version` is not included.
    fn counters(&self) -> Vec<(&'static str, u32)>;

    /// Mark every feature counter unsupported. `version` is kept.
    fn clear(&mut self);

    fn is_cleared(&self) -> bool {
        self.counters()
            .iter()
            .all(|(_, counter)| *counter == UNSUPPORTED)
    }

    /// True when the peer record can be used for feature negotiation.
    fn is_supported(&self) -> bool {
        self.version() <= Self::LOCAL_MAX_VERSION && !self.is_cleared()
    }

    /// True when every counter of `self` is at most the matching counter of
    /// `other`: a field introduced at `self` may be exchanged with `other`.
    fn is_satisfied_by(&self, other: &Self) -> bool {
        matches!(
            compare(self, other),
            Some(Ordering::Less | Ordering::Equal)
        )
    }
}

/// Component-wise comparison over `version` and every counter.
///
/// Returns `None` when some components are greater and others smaller.
pub fn compare<V: VersionRecord>(lhs: &V, rhs: &V) -> Option<Ordering> {
    let left = std::iter::once(lhs.version()).chain(lhs.counters().into_iter().map(|(_, c)| c));
    let right = std::iter::once(rhs.version()).chain(rhs.counters().into_iter().map(|(_, c)| c));

    let mut ordering = Ordering::Equal;
    for (a, b) in left.zip(right) {
        match (ordering, a.cmp(&b)) {
            (_, Ordering::Equal) => {}
            (Ordering::Equal, next) => ordering = next,
            (current, next) if current != next => return None,
            _ => {}
        }
    }
    Some(ordering)
}

/// Decode hook for version records: clamp records newer than this build.
pub fn clamp_after_decode<V: VersionRecord>(record: &mut V, _ctx: &Context) -> Result<()> {
    if record.version() > V::LOCAL_MAX_VERSION {
        tracing::debug!(
            family = V::FAMILY,
            version = record.version(),
            local = V::LOCAL_MAX_VERSION,
            "peer version newer than local, clearing feature counters"
        );
        record.clear();
    }
    Ok(())
}

/// Implement `PartialOrd` for version records from [`compare`].
#[macro_export]
macro_rules! version_ordering {
    ($($ty:ty),+ $(,)?) => {$(
        impl ::std::cmp::PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<::std::cmp::Ordering> {
                $crate::version::compare(self, other)
            }
        }
    )+};
}
