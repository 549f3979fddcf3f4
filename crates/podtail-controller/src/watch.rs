use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use podtail_types::PodSnapshot;

/// Result of the initial pod listing for a namespace
#[derive(Clone, Debug)]
pub enum PodListing {
    /// A typed pod list
    Pods(Vec<PodSnapshot>),
    /// A heterogeneous list; only pod items are considered
    Items(Vec<ListItem>),
    /// Anything else. The controller treats this as a broken contract.
    Unrecognized { kind: String },
}

#[derive(Clone, Debug)]
pub enum ListItem {
    Pod(PodSnapshot),
    Other { kind: String },
}

impl PodListing {
    /// Pods contained in the listing, or the kind of an unrecognized listing
    pub fn into_pods(self) -> Result<Vec<PodSnapshot>, String> {
        match self {
            Self::Pods(pods) => Ok(pods),
            Self::Items(items) => Ok(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        ListItem::Pod(pod) => Some(pod),
                        ListItem::Other { .. } => None,
                    })
                    .collect(),
            ),
            Self::Unrecognized { kind } => Err(kind),
        }
    }
}

/// Receives live pod notifications for one namespace, in delivery order
pub trait PodEventHandler: Send + Sync + 'static {
    fn on_add(&self, pod: &PodSnapshot);
    fn on_update(&self, pod: &PodSnapshot);
    fn on_delete(&self, pod: &PodSnapshot);
}

/// Supplies the initial pod listing and the live event stream per namespace
pub trait WatchSource: Send + Sync + 'static {
    /// One synchronous listing of the pods in `namespace`
    fn list(&self, namespace: &str) -> BoxFuture<'_, anyhow::Result<PodListing>>;

    /// Deliver add/update/delete notifications until `stop` is cancelled.
    ///
    /// Must deliver an add for every pod present at subscribe time that the
    /// listing did not cover, and a delete when a pod leaves the cluster.
    fn subscribe(
        &self,
        namespace: String,
        handler: Arc<dyn PodEventHandler>,
        stop: CancellationToken,
    ) -> BoxFuture<'static, ()>;
}
