//! Host modules and their configuration.

use hostabi_types::BoxError;

use crate::function::Functions;

/// A live, stateful host module instance; the receiver of its functions.
///
/// Calls may reach the same instance from several threads at once. Mutable
/// state needs interior mutability chosen by the module author.
pub trait Module: Send + Sync + 'static {
    /// Releases the resources held by the instance. Called once, when the
    /// instance or its instantiation context is closed.
    fn close(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A type-safe host module: a named set of functions over one instance type.
///
/// Host modules are immutable descriptions, shared between every
/// instantiation.
pub trait HostModule: Send + Sync {
    type Instance: Module;

    /// Import module name the guest links against, e.g. `"env"`.
    fn name(&self) -> &str;

    /// Functions exported by the module, keyed by export name.
    fn functions(&self) -> Functions<Self::Instance>;

    /// Creates an instance configured by `options`.
    fn instantiate(&self, options: &[Box<dyn Configure<Self::Instance>>]) -> Result<Self::Instance, BoxError>;
}

/// A configuration step applied to a value while it is being created.
pub trait Configure<T>: Send + Sync {
    fn configure(&self, value: &mut T);
}

impl<T, F> Configure<T> for F
where
    F: Fn(&mut T) + Send + Sync,
{
    fn configure(&self, value: &mut T) {
        self(value)
    }
}

/// Boxes a closure as a configuration option.
pub fn option<T, F>(f: F) -> Box<dyn Configure<T>>
where
    F: Fn(&mut T) + Send + Sync + 'static,
{
    Box::new(f)
}

/// Applies `options` to `value`, in order.
pub fn configure<T>(value: &mut T, options: &[Box<dyn Configure<T>>]) {
    for option in options {
        option.configure(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Settings {
        depth: u32,
        name: String,
    }

    #[test]
    fn test_options_apply_in_order() {
        let options = vec![
            option(|s: &mut Settings| s.depth = 1),
            option(|s: &mut Settings| s.depth *= 10),
            option(|s: &mut Settings| s.name.push_str("x")),
        ];
        let mut settings = Settings::default();
        configure(&mut settings, &options);
        assert_eq!(settings.depth, 10);
        assert_eq!(settings.name, "x");
    }
}
