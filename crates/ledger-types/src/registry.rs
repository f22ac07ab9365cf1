//! Registry trait for self-registering implementations.
//!
//! Pluggable modules (currently the storage backends) each provide a Registry
//! struct implementing this trait, declaring the name they are referenced by
//! in configuration together with a factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function that can create instances of this
	/// implementation when provided with the appropriate configuration.
	fn factory() -> Self::Factory;
}
