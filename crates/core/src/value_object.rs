//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** — two instances
/// with the same attribute values are the same value. `TemperatureRange` and
/// `BinPath` are value objects; a `ReconciliationBatch` is not (it has
/// identity and a lifecycle).
///
/// To "modify" a value object, construct a new one. This keeps values safe to
/// share across threads and safe to copy around like primitives.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
