// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Named collaborators looked up by the pipeline assembler.
//!
//! Beans are stored as `Arc<T>` keyed by the type `T` (usually a trait
//! object such as `dyn Encoder`) and a name. Each type may also have one
//! default bean, used when the configuration names none.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::RegistrationError;

type Erased = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct BeanRegistry {
    named: HashMap<(TypeId, String), Erased>,
    defaults: HashMap<TypeId, Erased>,
}

impl std::fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.named.keys().map(|(_, name)| name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("BeanRegistry")
            .field("named", &names)
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

impl BeanRegistry {
    pub fn new() -> Self {
        BeanRegistry::default()
    }

    /// Register `bean` under `name`, replacing any previous bean of the same
    /// type and name.
    pub fn register<T>(&mut self, name: &str, bean: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.named
            .insert((TypeId::of::<T>(), name.to_string()), Arc::new(bean));
        self
    }

    pub fn register_default<T>(&mut self, bean: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.defaults.insert(TypeId::of::<T>(), Arc::new(bean));
        self
    }

    /// Register the default bean of `T` unless one is already present.
    /// Returns true if `bean` was installed.
    pub fn register_default_if_missing<T>(&mut self, bean: impl FnOnce() -> Arc<T>) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if self.defaults.contains_key(&TypeId::of::<T>()) {
            return false;
        }
        self.register_default(bean());
        true
    }

    pub fn with<T>(mut self, name: &str, bean: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(name, bean);
        self
    }

    pub fn with_default<T>(mut self, bean: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_default(bean);
        self
    }

    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.named
            .get(&(TypeId::of::<T>(), name.to_string()))
            .and_then(unerase)
    }

    pub fn default_bean<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.defaults.get(&TypeId::of::<T>()).and_then(unerase)
    }

    /// The bean named `name`, or the default bean when no name is given.
    pub fn lookup<T>(&self, name: Option<&str>) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match name {
            Some(name) => self.get(name),
            None => self.default_bean(),
        }
    }

    /// Like [`BeanRegistry::lookup`], failing when the bean is absent.
    pub fn require<T>(&self, kind: &'static str, name: Option<&str>) -> Result<Arc<T>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lookup(name).ok_or_else(|| match name {
            Some(name) => RegistrationError::MissingBean {
                kind,
                name: name.to_string(),
            },
            None => RegistrationError::MissingDefault(kind),
        })
    }
}

fn unerase<T>(erased: &Erased) -> Option<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    erased.downcast_ref::<Arc<T>>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: std::fmt::Debug + Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Debug)]
    struct Hello(&'static str);

    impl Greeter for Hello {
        fn greet(&self) -> String {
            format!("hello {}", self.0)
        }
    }

    #[test]
    fn test_named_and_default_lookup() {
        let beans = BeanRegistry::new()
            .with::<dyn Greeter>("world", Arc::new(Hello("world")))
            .with_default::<dyn Greeter>(Arc::new(Hello("default")));

        let named = beans.lookup::<dyn Greeter>(Some("world")).expect("named bean");
        assert_eq!(named.greet(), "hello world");

        let default = beans.lookup::<dyn Greeter>(None).expect("default bean");
        assert_eq!(default.greet(), "hello default");

        assert!(beans.get::<dyn Greeter>("moon").is_none());
        // same name, other type
        assert!(beans.get::<Hello>("world").is_none());
    }

    #[test]
    fn test_require_reports_missing_beans() {
        let beans = BeanRegistry::new();
        let err = beans
            .require::<dyn Greeter>("greeter", Some("moon"))
            .expect_err("missing named bean");
        assert!(matches!(
            err,
            RegistrationError::MissingBean { kind: "greeter", ref name } if name == "moon"
        ));

        let err = beans
            .require::<dyn Greeter>("greeter", None)
            .expect_err("missing default");
        assert!(matches!(err, RegistrationError::MissingDefault("greeter")));
    }

    #[test]
    fn test_default_if_missing_keeps_user_bean() {
        let mut beans = BeanRegistry::new().with_default::<dyn Greeter>(Arc::new(Hello("user")));
        let installed = beans.register_default_if_missing::<dyn Greeter>(|| Arc::new(Hello("builtin")));
        assert!(!installed);
        let bean = beans.default_bean::<dyn Greeter>().expect("default bean");
        assert_eq!(bean.greet(), "hello user");
    }
}
