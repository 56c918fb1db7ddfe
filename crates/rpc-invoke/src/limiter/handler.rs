use crate::domain::config::LimiterSettings;
use crate::limiter::{parse_limiter_configs, LimiterRegistry};
use crate::settings::{Attributes, ConfigEventHandler, GLOBAL_SETTING, SETTING_INVOKE_PROVIDER_LIMIT};
use std::sync::Arc;
use tracing::{debug, error};

/// Rebuilds a service's limiters when its `provider.limit` setting changes
pub struct LimiterConfigHandler {
    registry: Arc<LimiterRegistry>,
    default_kind: String,
}

impl LimiterConfigHandler {
    pub fn new(registry: Arc<LimiterRegistry>, default_kind: impl Into<String>) -> Self {
        Self {
            registry,
            default_kind: default_kind.into(),
        }
    }

    pub fn from_settings(registry: Arc<LimiterRegistry>, settings: &LimiterSettings) -> Self {
        Self::new(registry, settings.default_type.clone())
    }
}

impl ConfigEventHandler for LimiterConfigHandler {
    fn name(&self) -> &str {
        "limiter"
    }

    fn keys(&self) -> &[&'static str] {
        &[SETTING_INVOKE_PROVIDER_LIMIT]
    }

    fn handle(&self, class_name: &str, old: &Attributes, new: &Attributes) {
        if class_name == GLOBAL_SETTING {
            return;
        }
        let before = old.get(SETTING_INVOKE_PROVIDER_LIMIT);
        let after = new.get(SETTING_INVOKE_PROVIDER_LIMIT);
        if before == after {
            debug!(class = class_name, "Limiter config unchanged");
            return;
        }

        match parse_limiter_configs(after.map(String::as_str), &self.default_kind) {
            Ok(Some(configs)) => {
                let existing = self.registry.get(class_name);
                let set = self.registry.reconcile(configs, existing.as_deref());
                self.registry.update(class_name, Some(set));
            }
            Ok(None) => self.registry.update(class_name, None),
            Err(e) => {
                error!(class = class_name, error = %e, "Error occurs while parsing limiter config");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::DEFAULT_LIMITER_TYPE;

    fn attrs(value: Option<&str>) -> Attributes {
        let mut attrs = Attributes::new();
        if let Some(value) = value {
            attrs.insert(SETTING_INVOKE_PROVIDER_LIMIT.into(), value.into());
        }
        attrs.insert("unrelated".into(), "x".into());
        attrs
    }

    fn handler() -> (Arc<LimiterRegistry>, LimiterConfigHandler) {
        let registry = Arc::new(LimiterRegistry::new());
        let handler = LimiterConfigHandler::new(Arc::clone(&registry), DEFAULT_LIMITER_TYPE);
        (registry, handler)
    }

    const FIVE: &str = r#"[{ "method": "bar", "limit": 5 }]"#;
    const NINE: &str = r#"[{ "method": "bar", "limit": 9 }]"#;

    #[test]
    fn test_unchanged_value_is_noop() {
        let (registry, handler) = handler();
        handler.handle("svc", &attrs(None), &attrs(Some(FIVE)));
        let first = registry.get("svc").unwrap();

        handler.handle("svc", &attrs(Some(FIVE)), &attrs(Some(FIVE)));
        let second = registry.get("svc").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_parameter_change_keeps_instance() {
        let (registry, handler) = handler();
        handler.handle("svc", &attrs(None), &attrs(Some(FIVE)));
        let before = Arc::clone(registry.get("svc").unwrap().get("bar::").unwrap());

        handler.handle("svc", &attrs(Some(FIVE)), &attrs(Some(NINE)));
        let set = registry.get("svc").unwrap();
        let after = set.get("bar::").unwrap();
        assert!(Arc::ptr_eq(&before, after));
        assert_eq!(after.config().map(|c| c.limit_count), Some(9));
    }

    #[test]
    fn test_parse_error_keeps_previous_set() {
        let (registry, handler) = handler();
        handler.handle("svc", &attrs(None), &attrs(Some(FIVE)));
        let before = registry.get("svc").unwrap();

        handler.handle("svc", &attrs(Some(FIVE)), &attrs(Some("[oops")));
        assert!(Arc::ptr_eq(&before, &registry.get("svc").unwrap()));
    }

    #[test]
    fn test_removal_clears_and_global_ignored() {
        let (registry, handler) = handler();
        handler.handle(GLOBAL_SETTING, &attrs(None), &attrs(Some(FIVE)));
        assert!(registry.get(GLOBAL_SETTING).is_none());

        handler.handle("svc", &attrs(None), &attrs(Some(FIVE)));
        handler.handle("svc", &attrs(Some(FIVE)), &attrs(None));
        assert!(registry.get("svc").is_none());
    }
}
