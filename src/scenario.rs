use std::{future::Future, marker::PhantomData};

use typed_builder::TypedBuilder;

use crate::trial::Trial;

/// The unit of work a run repeats: a named action producing one [`Trial`].
///
/// The action is called once per dispatched trial, inside the trial's own task.
/// Cheap-to-clone handles (clients, workload sources) belong in the closure's
/// captures; building them inside the action would be measured as latency.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Scenario<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Trial> + Send + 'static,
{
    #[builder(setter(into))]
    pub name: String,
    pub action: F,
    #[builder(default, setter(skip))]
    _trial: PhantomData<fn() -> Fut>,
}
