use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::descriptors::{Links, ServiceId};

/// One entry of the construction order.
///
/// Wraps a top-level descriptor with its linked parameters. Beans travel with
/// their parent as nested items, since they are built right after it.
/// Equality and hashing use the descriptor id only.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub(crate) id: ServiceId,
    pub(crate) links: Arc<Links>,
    pub(crate) beans: Vec<WorkItem>,
}

impl WorkItem {
    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn beans(&self) -> &[WorkItem] {
        &self.beans
    }

    /// This item followed by its beans, depth first.
    pub fn flatten(&self) -> Vec<&WorkItem> {
        let mut out = vec![self];
        for bean in &self.beans {
            out.extend(bean.flatten());
        }
        out
    }
}

impl PartialEq for WorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkItem {}

impl Hash for WorkItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
