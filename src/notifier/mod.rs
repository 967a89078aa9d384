mod notifier;
pub use notifier::*;

#[cfg(test)]
mod notifier_test;
