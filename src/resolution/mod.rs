//! Dependency resolution: turns the descriptor arena into a construction order.
//!
//! Resolution is a depth-first walk over the dependency graph driven by an
//! explicit frame stack. Each frame owns one top-level descriptor together
//! with its beans and works through their aspects, constructor parameters
//! and fields in order. Every producer bound to a step is resolved before
//! the next step runs, so a frame is appended to the output only once all
//! of its producers are.

mod work_item;

pub use work_item::WorkItem;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::compat::find_compatible;
use crate::dependency::DependencyParam;
use crate::descriptors::{AspectLink, Links, ServiceDescriptor, ServiceId, ServiceState};
use crate::error::{DiError, DiResult};
use crate::internal::Trace;
use crate::key::Key;
use crate::traits::ExternalResolver;

/// Resolves every top-level descriptor and returns them in dependency-safe
/// order, each after all of its producers.
///
/// Diamonds resolve once. Fails on the first missing, ambiguous or circular
/// dependency. Depth is unbounded; the frame stack lives on the heap.
///
/// ```rust
/// use ferrous_ioc::{resolve_dependencies, Dependency, ServiceCollection, ServiceDescriptor};
///
/// struct A;
/// struct B;
///
/// let mut services = ServiceCollection::new();
/// let b = services.add(
///     ServiceDescriptor::service::<B>()
///         .depends_on(Dependency::of::<A>())
///         .constructor(|_| Ok(B)),
/// );
/// let a = services.add(ServiceDescriptor::service::<A>().constructor(|_| Ok(A)));
///
/// let order = resolve_dependencies(services.descriptors(), &[]).unwrap();
/// let ids: Vec<_> = order.iter().map(|item| item.id()).collect();
/// assert_eq!(ids, vec![a, b]);
/// ```
pub fn resolve_dependencies(
    arena: &[ServiceDescriptor],
    resolvers: &[Arc<dyn ExternalResolver>],
) -> DiResult<Vec<WorkItem>> {
    DependencyResolver::new(arena, resolvers, None).resolve()
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Aspect { slot: usize, index: usize },
    Param { slot: usize, index: usize },
    Field { slot: usize, index: usize },
}

struct Frame {
    id: ServiceId,
    steps: Vec<Step>,
    cursor: usize,
    pending: VecDeque<ServiceId>,
    /// Links of the root and each of its beans, depth first.
    links: Vec<(ServiceId, Links)>,
}

impl Frame {
    fn new(id: ServiceId, arena: &[ServiceDescriptor]) -> Self {
        let mut owners = Vec::new();
        collect_owners(id, arena, &mut owners);

        let mut steps = Vec::new();
        let mut links = Vec::with_capacity(owners.len());
        for (slot, owner) in owners.iter().enumerate() {
            let d = &arena[owner.0];
            steps.extend((0..d.interceptions.len()).map(|index| Step::Aspect { slot, index }));
            steps.extend((0..d.params.len()).map(|index| Step::Param { slot, index }));
            steps.extend((0..d.fields.len()).map(|index| Step::Field { slot, index }));
            links.push((
                *owner,
                Links {
                    params: d.params.iter().cloned().map(DependencyParam::new).collect(),
                    fields: d.fields.iter().map(|f| DependencyParam::new(f.dependency.clone())).collect(),
                    aspects: Vec::with_capacity(d.interceptions.len()),
                },
            ));
        }

        Self {
            id,
            steps,
            cursor: 0,
            pending: VecDeque::new(),
            links,
        }
    }

    fn into_item(self, arena: &[ServiceDescriptor]) -> WorkItem {
        let mut by_owner: HashMap<ServiceId, Links> = self.links.into_iter().collect();
        build_item(self.id, arena, &mut by_owner)
    }
}

fn collect_owners(id: ServiceId, arena: &[ServiceDescriptor], out: &mut Vec<ServiceId>) {
    out.push(id);
    for bean in &arena[id.0].beans {
        collect_owners(*bean, arena, out);
    }
}

fn build_item(id: ServiceId, arena: &[ServiceDescriptor], links: &mut HashMap<ServiceId, Links>) -> WorkItem {
    let own = links.remove(&id).unwrap_or_default();
    let beans = arena[id.0]
        .beans
        .iter()
        .map(|bean| build_item(*bean, arena, links))
        .collect();
    WorkItem {
        id,
        links: Arc::new(own),
        beans,
    }
}

pub(crate) struct DependencyResolver<'a> {
    arena: &'a [ServiceDescriptor],
    resolvers: &'a [Arc<dyn ExternalResolver>],
    max_depth: Option<usize>,
}

impl<'a> DependencyResolver<'a> {
    pub(crate) fn new(
        arena: &'a [ServiceDescriptor],
        resolvers: &'a [Arc<dyn ExternalResolver>],
        max_depth: Option<usize>,
    ) -> Self {
        Self {
            arena,
            resolvers,
            max_depth,
        }
    }

    pub(crate) fn resolve(&self) -> DiResult<Vec<WorkItem>> {
        let mut output = Vec::new();
        let mut done: HashSet<ServiceId> = HashSet::new();
        let mut trace = Trace::new(self.max_depth);
        let mut stack: Vec<Frame> = Vec::new();

        for root in self.arena.iter().filter(|d| d.parent.is_none()) {
            if done.contains(&root.id) {
                continue;
            }
            self.enter(root.id, &mut trace, &mut stack)?;

            while let Some(frame) = stack.last_mut() {
                if let Some(next) = frame.pending.pop_front() {
                    if !done.contains(&next) {
                        self.enter(next, &mut trace, &mut stack)?;
                    }
                    continue;
                }

                if let Some(step) = frame.steps.get(frame.cursor).copied() {
                    frame.cursor += 1;
                    let producers = self.bind(frame, step)?;
                    for producer in producers {
                        let root = self.root_of(producer);
                        if !frame.pending.contains(&root) {
                            frame.pending.push_back(root);
                        }
                    }
                    continue;
                }

                let Some(frame) = stack.pop() else { break };
                trace.leave();
                for (owner, _) in &frame.links {
                    self.arena[owner.0].slots.set_state(ServiceState::Resolved);
                }
                debug!(
                    service = %self.arena[frame.id.0].label(),
                    position = output.len(),
                    "resolved"
                );
                done.insert(frame.id);
                output.push(frame.into_item(self.arena));
            }
        }

        Ok(output)
    }

    fn enter(&self, id: ServiceId, trace: &mut Trace, stack: &mut Vec<Frame>) -> DiResult<()> {
        trace.enter(id, self.arena)?;
        self.check_beans(id)?;
        trace!(service = %self.arena[id.0].label(), depth = trace.depth(), "resolving");
        self.arena[id.0].slots.set_state(ServiceState::Resolving);
        stack.push(Frame::new(id, self.arena));
        Ok(())
    }

    /// Beans are built from their parent alone; constructor parameters on a
    /// bean would never reach its factory.
    fn check_beans(&self, id: ServiceId) -> DiResult<()> {
        for bean in &self.arena[id.0].beans {
            let d = &self.arena[bean.0];
            if !d.params.is_empty() {
                return Err(DiError::construction(
                    d.label(),
                    "beans take no constructor parameters, inject fields instead".into(),
                ));
            }
            self.check_beans(*bean)?;
        }
        Ok(())
    }

    /// Top-level descriptor that has to be built before `id` exists.
    fn root_of(&self, mut id: ServiceId) -> ServiceId {
        while let Some(parent) = self.arena[id.0].parent {
            id = parent;
        }
        id
    }

    fn bind(&self, frame: &mut Frame, step: Step) -> DiResult<Vec<ServiceId>> {
        match step {
            Step::Aspect { slot, index } => {
                let (owner_id, links) = &mut frame.links[slot];
                let owner = &self.arena[owner_id.0];
                let interception = &owner.interceptions[index];
                let aspect = self.bind_aspect(owner, &interception.aspect)?;
                links.aspects.push(AspectLink {
                    method: interception.method.clone(),
                    aspect,
                    marker: interception.marker.clone(),
                });
                Ok(vec![aspect])
            }
            Step::Param { slot, index } => {
                let (owner_id, links) = &mut frame.links[slot];
                self.bind_param(&self.arena[owner_id.0], &mut links.params[index])
            }
            Step::Field { slot, index } => {
                let (owner_id, links) = &mut frame.links[slot];
                self.bind_param(&self.arena[owner_id.0], &mut links.fields[index])
            }
        }
    }

    fn bind_aspect(&self, owner: &ServiceDescriptor, key: &Key) -> DiResult<ServiceId> {
        let matches = find_compatible(self.arena, key, None);
        match matches.as_slice() {
            [one] => Ok(*one),
            [] => Err(DiError::MissingDependency {
                service: owner.label(),
                dependency: key.display_name().to_string(),
                qualifier: None,
            }),
            _ => Err(self.ambiguous(owner, key, &matches)),
        }
    }

    fn bind_param(&self, owner: &ServiceDescriptor, param: &mut DependencyParam) -> DiResult<Vec<ServiceId>> {
        let key = *param.key();
        let qualifier = param.qualifier().map(str::to_owned);
        let matches = find_compatible(self.arena, &key, qualifier.as_deref());

        if matches.is_empty() {
            if qualifier.is_none() {
                if let Some(resolver) = self.resolvers.iter().find(|r| r.can_resolve(param)) {
                    trace!(
                        service = %owner.label(),
                        dependency = key.display_name(),
                        resolver = resolver.name(),
                        "bound to external resolver"
                    );
                    param.bind_resolver(resolver.clone());
                    return Ok(Vec::new());
                }
            }
            if param.is_required() {
                return Err(DiError::MissingDependency {
                    service: owner.label(),
                    dependency: key.display_name().to_string(),
                    qualifier,
                });
            }
            trace!(service = %owner.label(), dependency = key.display_name(), "optional dependency left unresolved");
            return Ok(Vec::new());
        }

        if param.is_collection() {
            param.bind_all(matches.clone());
        } else if matches.len() > 1 {
            return Err(self.ambiguous(owner, &key, &matches));
        } else {
            param.bind_single(matches[0]);
        }

        trace!(
            service = %owner.label(),
            dependency = key.display_name(),
            producers = matches.len(),
            "bound"
        );
        Ok(matches)
    }

    fn ambiguous(&self, owner: &ServiceDescriptor, key: &Key, matches: &[ServiceId]) -> DiError {
        DiError::AmbiguousDependency {
            service: owner.label(),
            dependency: key.display_name().to_string(),
            candidates: matches.iter().map(|id| self.arena[id.0].label()).collect(),
        }
    }
}
