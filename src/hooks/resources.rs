use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    rc::Rc,
};

use crate::{
    core::{raise, FiberOptions, Updater},
    deps, BoxError, Cleanup, RenderContext, RenderResult, ResourceElement, ResourceFiber,
    TapError,
};

type Children<K, R, P> = HashMap<K, ResourceFiber<R, P>>;

struct ChildPlan<K, R: 'static, P: 'static> {
    remove: Vec<K>,
    add: Vec<(K, ResourceFiber<R, P>)>,
    commit: Vec<(K, RenderResult<R, P>)>,
}

impl<K, R, P> ChildPlan<K, R, P>
where
    K: Eq + Hash + 'static,
    R: 'static,
    P: 'static,
{
    fn apply(self, children: &mut Children<K, R, P>) -> Result<(), TapError> {
        for key in self.remove {
            if let Some(mut fiber) = children.remove(&key) {
                fiber.teardown()?;
            }
        }
        children.extend(self.add);
        for (key, result) in self.commit {
            if let Some(fiber) = children.get_mut(&key) {
                fiber.commit(result)?;
            }
        }
        Ok(())
    }
}

impl RenderContext<'_> {
    /// Renders one child fiber per key and returns their outputs in the order given.
    ///
    /// Children are created, removed and committed in the commit of this resource.
    /// A key whose resource changes gets a new fiber, and the old one is torn down.
    /// State updates of a child re-render this resource.
    ///
    /// # Panics
    ///
    /// Panics if a key appears more than once.
    pub fn tap_resources<K, R, P>(
        &mut self,
        elements: impl IntoIterator<Item = (K, ResourceElement<R, P>)>,
    ) -> Vec<(K, R)>
    where
        K: Eq + Hash + Clone + 'static,
        R: Clone + 'static,
        P: 'static,
    {
        let parent = Rc::downgrade(self.shared);
        let updater: Updater = Rc::new(move || {
            if let Some(parent) = parent.upgrade() {
                parent.request_update();
            }
        });
        let children = self.tap_ref(Children::<K, R, P>::new);
        let scope = self.scope.clone();

        let mut plan = ChildPlan {
            remove: Vec::new(),
            add: Vec::new(),
            commit: Vec::new(),
        };
        let mut outputs = Vec::new();
        let mut seen = HashSet::new();
        {
            let mut fibers = children.borrow_mut();
            for (key, element) in elements {
                if !seen.insert(key.clone()) {
                    panic!("{}: duplicate resource key", self.fiber());
                }
                let ResourceElement { resource, props } = element;
                let result = match fibers
                    .get_mut(&key)
                    .filter(|fiber| fiber.resource().ptr_eq(&resource))
                {
                    Some(fiber) => fiber.render_scoped(props, scope.clone()),
                    None => {
                        if fibers.contains_key(&key) {
                            plan.remove.push(key.clone());
                        }
                        let mut fiber = ResourceFiber::with_updater(
                            resource,
                            FiberOptions::default(),
                            Some(updater.clone()),
                        );
                        let result = fiber.render_scoped(props, scope.clone());
                        plan.add.push((key.clone(), fiber));
                        result
                    }
                };
                let result = result.unwrap_or_else(|e| raise(e));
                outputs.push((key.clone(), result.output().clone()));
                plan.commit.push((key, result));
            }
            plan.remove
                .extend(fibers.keys().filter(|key| !seen.contains(*key)).cloned());
        }

        let target = children.clone();
        self.tap_effect(None, move || plan.apply(&mut target.borrow_mut()));

        let target = children;
        self.tap_effect(deps![], move || {
            Cleanup::try_new(move || {
                let mut first: Option<TapError> = None;
                for (_, mut fiber) in target.borrow_mut().drain() {
                    if let Err(e) = fiber.teardown() {
                        first.get_or_insert(e);
                    }
                }
                match first {
                    Some(e) => Err(BoxError::from(e)),
                    None => Ok(()),
                }
            })
        });
        outputs
    }
}
