//! Credential Resolution
//!
//! A provider's API key comes from the request's session credentials when the
//! caller supplied one, otherwise from the environment variable named in its
//! descriptor.

use suite_gateway_core::RequestContext;
use suite_gateway_llm::ProviderDescriptor;

/// Resolves the API key for one provider call.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, descriptor: &ProviderDescriptor, ctx: &RequestContext) -> Option<String>;
}

/// Session override first, then `descriptor.api_key_env`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialResolver;

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self, descriptor: &ProviderDescriptor, ctx: &RequestContext) -> Option<String> {
        if let Some(key) = ctx
            .session_credential(&descriptor.name)
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            return Some(key.to_string());
        }
        descriptor
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}
