use std::{cell::RefCell, rc::Rc};

use assert_call::{call, CallRecorder};

use crate::{
    deps,
    test_helpers::render_commit,
    Callback, Cleanup, Context, Dispatch, EffectEvent, FiberOptions, Resource, ResourceFiber,
    SetState, TapError,
};

type Slot<T> = Rc<RefCell<Option<T>>>;

fn slot<T>() -> Slot<T> {
    Rc::new(RefCell::new(None))
}
fn get<T: Clone>(slot: &Slot<T>) -> T {
    slot.borrow().clone().unwrap()
}

#[test]
fn state_applies_queued_updates_in_order() {
    let setter: Slot<SetState<i32>> = slot();
    let s = setter.clone();
    let r = Resource::new("state", move |cx, _: &()| {
        let (value, set) = cx.tap_state(|| 1);
        *s.borrow_mut() = Some(set);
        value
    });
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 1);

    let set = get(&setter);
    set.update(|v| v + 1);
    set.update(|v| v * 10);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 20);

    set.set(7);
    set.update(|v| v + 1);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 8);
}

#[test]
fn state_initializer_runs_once() {
    let mut cr = CallRecorder::new();
    let r = Resource::new("init", |cx, _: &()| {
        cx.tap_state(|| {
            call!("init");
            5
        })
        .0
    });
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 5);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 5);
    cr.verify("init");
}

#[test]
fn reducer_applies_actions() {
    let dispatch: Slot<Dispatch<&'static str>> = slot();
    let d = dispatch.clone();
    let r = Resource::new("reducer", move |cx, _: &()| {
        let (log, dispatch) = cx.tap_reducer(
            |log: &Vec<&'static str>, action: &'static str| {
                let mut log = log.clone();
                log.push(action);
                log
            },
            Vec::new,
        );
        *d.borrow_mut() = Some(dispatch);
        log
    });
    let mut fiber = ResourceFiber::new(r);
    assert!(render_commit(&mut fiber, ()).unwrap().is_empty());

    let dispatch = get(&dispatch);
    dispatch.dispatch("a");
    dispatch.dispatch("b");
    assert!(fiber.is_dirty());
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), ["a", "b"]);
}

#[test]
fn setting_committed_value_does_not_request_update() {
    let mut cr = CallRecorder::new();
    let setter: Slot<SetState<i32>> = slot();
    let s = setter.clone();
    let r = Resource::new("steady", move |cx, _: &()| {
        let (value, set) = cx.tap_state(|| 3);
        *s.borrow_mut() = Some(set);
        value
    });
    let mut fiber =
        ResourceFiber::with_update_callback(r, FiberOptions::default(), || call!("update"));
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 3);

    let set = get(&setter);
    set.set(3);
    set.update(|v| *v);
    cr.verify(());
    assert!(!fiber.is_dirty());

    set.set(4);
    cr.verify("update");
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 4);
}

#[test]
fn pending_update_queues_actions_without_bailout() {
    let mut cr = CallRecorder::new();
    let setter: Slot<SetState<i32>> = slot();
    let s = setter.clone();
    let r = Resource::new("queued", move |cx, _: &()| {
        let (value, set) = cx.tap_state(|| 0);
        *s.borrow_mut() = Some(set);
        value
    });
    let mut fiber =
        ResourceFiber::with_update_callback(r, FiberOptions::default(), || call!("update"));
    render_commit(&mut fiber, ()).unwrap();

    let set = get(&setter);
    set.set(1);
    set.set(0);
    cr.verify(["update", "update"]);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 0);
}

#[test]
fn strict_mode_calls_initializer_and_reducer_twice() {
    let mut cr = CallRecorder::new();
    let dispatch: Slot<Dispatch<i32>> = slot();
    let d = dispatch.clone();
    let r = Resource::new("strict_reducer", move |cx, _: &()| {
        let (value, dispatch) = cx.tap_reducer(
            |value: &i32, action: i32| {
                call!("reduce {action}");
                value + action
            },
            || {
                call!("init");
                0
            },
        );
        *d.borrow_mut() = Some(dispatch);
        value
    });
    let mut fiber = ResourceFiber::with_options(r, FiberOptions::new().with_strict_mode(true));
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 0);
    cr.verify(["init", "init"]);

    get(&dispatch).dispatch(2);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 2);
    cr.verify(["reduce 2", "reduce 2"]);
}

#[test]
fn reducer_runs_once_per_action_outside_strict_mode() {
    let mut cr = CallRecorder::new();
    let dispatch: Slot<Dispatch<i32>> = slot();
    let d = dispatch.clone();
    let r = Resource::new("reducer", move |cx, _: &()| {
        let (value, dispatch) = cx.tap_reducer(
            |value: &i32, action: i32| {
                call!("reduce {action}");
                value + action
            },
            || 0,
        );
        *d.borrow_mut() = Some(dispatch);
        value
    });
    let mut fiber = ResourceFiber::new(r);
    render_commit(&mut fiber, ()).unwrap();

    let dispatch = get(&dispatch);
    dispatch.dispatch(2);
    dispatch.dispatch(3);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 5);
    cr.verify(["reduce 2", "reduce 3"]);
}

#[test]
fn derived_state_is_applied_and_renders_again() {
    let dispatch: Slot<Dispatch<i32>> = slot();
    let d = dispatch.clone();
    let r = Resource::new("clamped", move |cx, limit: &i32| {
        let limit = *limit;
        let (value, dispatch) = cx.tap_reducer_with_derived_state(
            |value: &i32, action: i32| value + action,
            |value: &i32| (*value).min(limit),
            || 0,
        );
        *d.borrow_mut() = Some(dispatch);
        value
    });
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, 10).unwrap(), 0);
    assert!(!fiber.is_dirty());

    get(&dispatch).dispatch(15);
    assert_eq!(render_commit(&mut fiber, 10).unwrap(), 10);
    assert!(fiber.is_dirty());
    assert_eq!(render_commit(&mut fiber, 10).unwrap(), 10);
    assert!(!fiber.is_dirty());

    assert_eq!(render_commit(&mut fiber, 4).unwrap(), 4);
    assert!(fiber.is_dirty());
}

#[test]
fn memo_recomputes_only_when_deps_change() {
    let mut cr = CallRecorder::new();
    let r = Resource::new("memo", |cx, &(a, b): &(i32, i32)| {
        cx.tap_memo(deps![a], move || {
            call!("compute {a}");
            a * 10
        }) + b
    });
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, (1, 0)).unwrap(), 10);
    cr.verify("compute 1");
    assert_eq!(render_commit(&mut fiber, (1, 5)).unwrap(), 15);
    cr.verify(());
    assert_eq!(render_commit(&mut fiber, (2, 0)).unwrap(), 20);
    cr.verify("compute 2");
}

#[test]
fn const_is_computed_once() {
    let mut cr = CallRecorder::new();
    let r = Resource::new("const", |cx, n: &i32| {
        let n = *n;
        cx.tap_const(move || {
            call!("compute");
            n
        })
    });
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, 1).unwrap(), 1);
    assert_eq!(render_commit(&mut fiber, 2).unwrap(), 1);
    cr.verify("compute");
}

#[test]
fn callback_identity_follows_deps() {
    let r = Resource::new("callback", |cx, &(factor, _): &(i32, i32)| {
        cx.tap_callback(deps![factor], move |x: i32| x * factor)
    });
    let mut fiber = ResourceFiber::new(r);
    let first: Callback<i32, i32> = render_commit(&mut fiber, (2, 0)).unwrap();
    let same = render_commit(&mut fiber, (2, 1)).unwrap();
    let changed = render_commit(&mut fiber, (3, 0)).unwrap();
    assert!(first.ptr_eq(&same));
    assert!(!first.ptr_eq(&changed));
    assert_eq!(first.call(5), 10);
    assert_eq!(changed.call(5), 15);
}

#[test]
fn ref_keeps_value_without_rerender() {
    let r = Resource::new("ref", |cx, _: &()| {
        let renders = cx.tap_ref(|| 0);
        *renders.borrow_mut() += 1;
        renders
    });
    let mut fiber = ResourceFiber::new(r);
    let renders = render_commit(&mut fiber, ()).unwrap();
    render_commit(&mut fiber, ()).unwrap();
    assert_eq!(*renders.borrow(), 2);
    *renders.borrow_mut() = 10;
    assert!(!fiber.is_dirty());
    render_commit(&mut fiber, ()).unwrap();
    assert_eq!(*renders.borrow(), 11);
}

#[test]
fn effect_event_calls_last_committed_closure() {
    let event: Slot<EffectEvent<i32, i32>> = slot();
    let e = event.clone();
    let r = Resource::new("event", move |cx, n: &i32| {
        let n = *n;
        *e.borrow_mut() = Some(cx.tap_effect_event(move |x: i32| x + n));
    });
    let mut fiber = ResourceFiber::new(r);
    render_commit(&mut fiber, 1).unwrap();
    let first = get(&event);
    assert_eq!(first.call(10), 11);

    let result = fiber.render(2).unwrap();
    assert_eq!(first.call(10), 11);
    fiber.commit(result).unwrap();
    assert_eq!(first.call(10), 12);
    assert_eq!(get(&event).call(10), 12);
}

#[test]
#[should_panic(expected = "effect event called before the resource was committed")]
fn effect_event_before_commit_panics() {
    let event: Slot<EffectEvent<(), ()>> = slot();
    let e = event.clone();
    let r = Resource::new("event", move |cx, _: &()| {
        *e.borrow_mut() = Some(cx.tap_effect_event(|()| {}));
    });
    let mut fiber = ResourceFiber::new(r);
    let _ = fiber.render(()).unwrap();
    get(&event).call(());
}

#[test]
fn context_falls_back_to_default() {
    let theme = Context::new("light");
    let r = Resource::new("themed", move |cx, _: &()| cx.tap_context(&theme));
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), "light");
}

#[test]
fn context_reads_innermost_provided_value() {
    let theme = Context::new("light");
    let r = Resource::new("themed", move |cx, _: &()| {
        let values = cx.provide(&theme, "dark", |cx| {
            let outer = cx.tap_context(&theme);
            let inner = cx.provide(&theme, "contrast", |cx| cx.tap_context(&theme));
            let after = cx.tap_context(&theme);
            vec![outer, inner, after]
        });
        let outside = cx.tap_context(&theme);
        (values, outside)
    });
    let mut fiber = ResourceFiber::new(r);
    let (values, outside) = render_commit(&mut fiber, ()).unwrap();
    assert_eq!(values, ["dark", "contrast", "dark"]);
    assert_eq!(outside, "light");
}

#[test]
fn reading_another_context_at_same_cell_is_an_error() {
    let a = Context::new(1);
    let b = Context::new(2);
    let r = Resource::new("switch", move |cx, use_b: &bool| {
        cx.tap_context(if *use_b { &b } else { &a })
    });
    let mut fiber = ResourceFiber::new(r);
    assert_eq!(render_commit(&mut fiber, false).unwrap(), 1);
    let e = fiber.render(true).unwrap_err();
    assert!(matches!(e, TapError::CellType { index: 0, .. }), "{e}");
}

fn item(label: &'static str) -> Resource<String, i32> {
    Resource::new("item", move |cx, n: &i32| {
        let n = *n;
        cx.tap_effect(deps![], move || {
            call!("mount {label} {n}");
            Cleanup::new(move || call!("unmount {label} {n}"))
        });
        format!("{label} {n}")
    })
}

type ListProps = Vec<(&'static str, i32)>;

fn list(item: Resource<String, i32>) -> Resource<Vec<(&'static str, String)>, ListProps> {
    Resource::new("list", move |cx, items: &ListProps| {
        cx.tap_resources(items.iter().map(|&(key, n)| (key, item.element(n))))
    })
}

#[test]
fn resources_mount_update_and_remove_children() {
    let mut cr = CallRecorder::new();
    let mut fiber = ResourceFiber::new(list(item("item")));

    let output = render_commit(&mut fiber, vec![("a", 1), ("b", 2)]).unwrap();
    assert_eq!(
        output,
        [("a", "item 1".to_string()), ("b", "item 2".to_string())]
    );
    cr.verify(["mount item 1", "mount item 2"]);

    let output = render_commit(&mut fiber, vec![("b", 20), ("c", 3)]).unwrap();
    assert_eq!(
        output,
        [("b", "item 20".to_string()), ("c", "item 3".to_string())]
    );
    cr.verify(["unmount item 1", "mount item 3"]);

    render_commit(&mut fiber, vec![("c", 3)]).unwrap();
    cr.verify("unmount item 2");

    fiber.teardown().unwrap();
    cr.verify("unmount item 3");
}

#[test]
fn resources_are_not_mounted_by_render_alone() {
    let mut cr = CallRecorder::new();
    let mut fiber = ResourceFiber::new(list(item("item")));
    let result = fiber.render(vec![("a", 1)]).unwrap();
    assert_eq!(result.output(), &[("a", "item 1".to_string())]);
    drop(result);
    cr.verify(());
}

#[test]
fn resources_remount_child_when_resource_changes() {
    let mut cr = CallRecorder::new();
    let first = item("first");
    let second = item("second");
    let r = Resource::new("switching", move |cx, use_second: &bool| {
        let item = if *use_second { &second } else { &first };
        cx.tap_resources([("key", item.element(1))])
    });
    let mut fiber = ResourceFiber::new(r);
    render_commit(&mut fiber, false).unwrap();
    cr.verify("mount first 1");
    render_commit(&mut fiber, true).unwrap();
    cr.verify(["unmount first 1", "mount second 1"]);
    render_commit(&mut fiber, true).unwrap();
    cr.verify(());
}

#[test]
fn child_state_update_rerenders_parent() {
    let mut cr = CallRecorder::new();
    let setter: Slot<SetState<i32>> = slot();
    let s = setter.clone();
    let child = Resource::new("child", move |cx, _: &()| {
        let (value, set) = cx.tap_state(|| 0);
        *s.borrow_mut() = Some(set);
        value
    });
    let parent = Resource::new("parent", move |cx, _: &()| {
        cx.tap_resources([(0, child.element(()))])[0].1
    });
    let mut fiber =
        ResourceFiber::with_update_callback(parent, FiberOptions::default(), || call!("update"));
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 0);

    get(&setter).set(4);
    cr.verify("update");
    assert!(fiber.is_dirty());
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), 4);
}

#[test]
fn child_reads_context_provided_by_parent() {
    let theme = Context::new("light");
    let t = theme.clone();
    let child = Resource::new("child", move |cx, _: &()| cx.tap_context(&t));
    let parent = Resource::new("parent", move |cx, _: &()| {
        cx.provide(&theme, "dark", |cx| cx.tap_resources([(0, child.element(()))]))
    });
    let mut fiber = ResourceFiber::new(parent);
    assert_eq!(render_commit(&mut fiber, ()).unwrap(), [(0, "dark")]);
}

#[test]
fn child_render_error_fails_parent_render() {
    let child = Resource::new("child", |cx, grow: &bool| {
        let _ = cx.tap_ref(|| 0);
        if *grow {
            let _ = cx.tap_ref(|| 0);
        }
    });
    let parent = Resource::new("parent", move |cx, grow: &bool| {
        cx.tap_resources([(0, child.element(*grow))]);
    });
    let mut fiber = ResourceFiber::new(parent);
    render_commit(&mut fiber, false).unwrap();
    let e = fiber.render(true).unwrap_err();
    assert!(matches!(e, TapError::CellShape { index: 1, .. }), "{e}");
    assert_ne!(e.fiber(), fiber.id());
}

#[test]
#[should_panic(expected = "duplicate resource key")]
fn duplicate_resource_key_panics() {
    let mut fiber = ResourceFiber::new(list(item("item")));
    let _ = fiber.render(vec![("a", 1), ("a", 2)]);
}
