use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};

/// Kubeconfig-backed client factory
pub struct KubeClient {
    kubeconfig: Kubeconfig,
    current_context: Option<String>,
}

impl KubeClient {
    /// Create a new KubeClient by loading the kubeconfig
    pub fn new() -> Result<Self> {
        let kubeconfig =
            Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        let current_context = kubeconfig.current_context.clone();
        Self {
            kubeconfig,
            current_context,
        }
    }

    /// Get the current context name
    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref()
    }

    /// Default namespace configured for a context (the current one if `None`)
    pub fn context_namespace(&self, context: Option<&str>) -> Option<String> {
        let name = context.or(self.current_context())?;
        self.kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.context.as_ref())
            .and_then(|c| c.namespace.clone())
    }

    /// Create a kube::Client for a context (the current one if `None`)
    pub async fn client(&self, context: Option<&str>) -> Result<kube::Client> {
        if let Some(name) = context {
            if !self.kubeconfig.contexts.iter().any(|c| c.name == name) {
                anyhow::bail!("Context '{}' not found in kubeconfig", name);
            }
        }

        let label = context.or(self.current_context()).unwrap_or("<default>");
        let config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: context.map(str::to_string),
                ..Default::default()
            },
        )
        .await
        .context(format!("Failed to create config for context: {}", label))?;

        kube::Client::try_from(config)
            .context(format!("Failed to create client for context: {}", label))
    }
}
