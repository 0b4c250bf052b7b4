//! End-to-end behavior of the registry and the event bus, using the derive macros

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use plinth::testing::{CallLog, TestLocator};
use plinth::{
    registration_table, service, Channel, EventBus, Handler, Inject, Injectable, ListenerStatus,
    Locator, Next, Registration, Registry, Service, TypeKey, Update,
};
use pretty_assertions::assert_eq;

// ----- services -----

#[service(order = 0)]
#[derive(Default, Injectable)]
struct Alpha;

impl Service for Alpha {}

#[service(order = 1)]
#[derive(Default, Injectable)]
struct Beta {
    #[inject]
    alpha: Inject<Alpha>,
}

impl Service for Beta {}

#[test]
fn dependent_service_sees_the_single_instance() {
    let registry = Registry::new();
    let report = registry.configure(vec![
        Registration::of::<Beta>().order(1),
        Registration::of::<Alpha>().order(0),
    ]);

    assert_eq!(report.created(), 2);
    assert_eq!(registry.len(), 2);
    let alpha = registry.get::<Alpha>().expect("alpha");
    let beta = registry.get::<Beta>().expect("beta");
    assert!(beta.alpha.holds(&alpha));
}

#[test]
fn registering_twice_keeps_one_instance() {
    let registry = Registry::new();
    let first = Rc::new(Alpha);
    assert!(registry.register_instance(first.clone()));
    assert!(!registry.register_instance(Rc::new(Alpha)));
    assert_eq!(registry.len(), 1);
    assert!(Rc::ptr_eq(&registry.get::<Alpha>().expect("alpha"), &first));
}

#[test]
fn collected_table_is_sorted_by_order() {
    let names: Vec<_> = registration_table()
        .iter()
        .map(|registration| registration.key().short_name())
        .collect();
    let alpha = names.iter().position(|n| *n == "Alpha").expect("Alpha collected");
    let beta = names.iter().position(|n| *n == "Beta").expect("Beta collected");
    assert!(alpha < beta);
}

// ----- deferred binding -----

#[derive(Default)]
struct Mixer {
    generation: u32,
}

#[derive(Default, Injectable)]
struct Speaker {
    #[inject(on_injected = mixer_changed)]
    mixer: Inject<Mixer>,
    log: CallLog,
}

impl Speaker {
    fn mixer_changed(&self) {
        let entry = match self.mixer.get() {
            Some(mixer) => format!("mixer {}", mixer.generation),
            None => "cleared".to_string(),
        };
        self.log.push(entry);
    }
}

#[test]
fn waiter_receives_one_update_on_registration() {
    let registry = Registry::new();
    let speaker = Rc::new(Speaker::default());
    registry.inject(&speaker, false, false);
    assert!(speaker.log.is_empty());

    registry.register_instance(Rc::new(Mixer { generation: 1 }));
    assert_eq!(speaker.log.entries(), vec!["mixer 1"]);

    // a second injection does not bind a second time
    registry.inject(&speaker, false, false);
    assert_eq!(speaker.log.entries(), vec!["mixer 1"]);
}

#[test]
fn dynamic_waiter_is_cleared_then_rebound() {
    let registry = Registry::new();
    registry.mark_dynamic::<Mixer>();
    registry.register_instance(Rc::new(Mixer { generation: 1 }));

    let speaker = Rc::new(Speaker::default());
    registry.inject(&speaker, false, false);
    speaker.log.take();

    registry.remove_instance::<Mixer>();
    registry.register_instance(Rc::new(Mixer { generation: 2 }));

    assert_eq!(speaker.log.entries(), vec!["cleared", "mixer 2"]);
    assert_eq!(speaker.mixer.with(|m| m.generation), Some(2));
}

#[test]
fn dropped_owner_stops_waiting() {
    let registry = Registry::new();
    let speaker = Rc::new(Speaker::default());
    let log = speaker.log.clone();
    registry.inject(&speaker, false, false);
    drop(speaker);

    registry.register_instance(Rc::new(Mixer { generation: 1 }));
    assert!(log.is_empty());
    assert_eq!(registry.waiter_count(TypeKey::of::<Mixer>()), 0);
}

#[derive(Default, Injectable)]
struct Loud {
    #[inject(base)]
    speaker: Speaker,
    #[inject]
    alpha: Inject<Alpha>,
}

#[test]
fn base_fields_are_injected_through_the_outer_type() {
    let registry = Registry::new();
    registry.register_instance(Rc::new(Mixer { generation: 7 }));
    registry.register_instance(Rc::new(Alpha));

    let loud = Rc::new(Loud::default());
    registry.inject(&loud, false, false);

    assert_eq!(loud.speaker.log.entries(), vec!["mixer 7"]);
    assert!(loud.alpha.is_set());
}

// ----- event bus -----

trait Greet {
    fn greet(&self, log: &CallLog);
}

struct Named(&'static str);

impl Greet for Named {
    fn greet(&self, log: &CallLog) {
        log.push(self.0);
    }
}

/// Registers a newcomer on the same channel the first time it is called
struct Recruiter {
    channel: Rc<Channel<dyn Greet>>,
    recruited: Cell<bool>,
}

impl Greet for Recruiter {
    fn greet(&self, log: &CallLog) {
        log.push("recruiter");
        if !self.recruited.replace(true) {
            let status = self.channel.register_listener(Rc::new(Named("newcomer")));
            assert_eq!(status, ListenerStatus::QueuedForAdd);
        }
    }
}

#[test]
fn listener_added_during_dispatch_runs_next_time() {
    let bus = EventBus::new();
    let channel = bus.channel::<dyn Greet>();
    channel.register_listener(Rc::new(Recruiter {
        channel: channel.clone(),
        recruited: Cell::new(false),
    }));

    let log = CallLog::new();
    bus.emit::<dyn Greet>(|l| l.greet(&log));
    assert_eq!(log.take(), vec!["recruiter"]);

    bus.emit::<dyn Greet>(|l| l.greet(&log));
    assert_eq!(log.take(), vec!["recruiter", "newcomer"]);
}

/// Removes itself from the channel while being called
struct Quitter {
    channel: Rc<Channel<dyn Greet>>,
    me: RefCell<Option<Rc<dyn Greet>>>,
}

impl Greet for Quitter {
    fn greet(&self, log: &CallLog) {
        log.push("quitter");
        if let Some(me) = self.me.borrow_mut().take() {
            assert!(self.channel.remove_listener(&me));
        }
    }
}

#[test]
fn listener_removing_itself_lets_the_pass_finish() {
    let channel = Rc::new(Channel::<dyn Greet>::new());
    let quitter = Rc::new(Quitter {
        channel: channel.clone(),
        me: RefCell::new(None),
    });
    let as_listener: Rc<dyn Greet> = quitter.clone();
    *quitter.me.borrow_mut() = Some(as_listener.clone());

    channel.register_listener(as_listener.clone());
    channel.register_listener(Rc::new(Named("stayer")));

    let log = CallLog::new();
    channel.invoke(|l| l.greet(&log));
    assert_eq!(log.take(), vec!["quitter", "stayer"]);
    assert!(!channel.contains(&as_listener));

    channel.invoke(|l| l.greet(&log));
    assert_eq!(log.take(), vec!["stayer"]);
}

struct Faulty;

impl Greet for Faulty {
    fn greet(&self, _log: &CallLog) {
        panic!("listener failed");
    }
}

#[test]
fn failing_listener_does_not_stop_the_pass() {
    let channel = Channel::<dyn Greet>::new();
    channel.register_listener(Rc::new(Faulty));
    channel.register_listener(Rc::new(Named("second")));

    let log = CallLog::new();
    channel.invoke(|l| l.greet(&log));
    assert_eq!(log.entries(), vec!["second"]);
    assert_eq!(channel.depth(), 0);
}

/// Records its priority, then forwards
struct Tag {
    priority: i32,
    next: Next<dyn Greet>,
}

impl Greet for Tag {
    fn greet(&self, log: &CallLog) {
        log.push(format!("tag {}", self.priority));
        if let Some(next) = self.next.get() {
            next.greet(log);
        }
    }
}

impl Handler<dyn Greet> for Tag {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn next(&self) -> &Next<dyn Greet> {
        &self.next
    }

    fn as_listener(self: Rc<Self>) -> Rc<dyn Greet> {
        self
    }
}

#[test]
fn decorators_wrap_by_descending_priority() {
    let channel = Channel::<dyn Greet>::new();
    for priority in [5, 1, 3] {
        channel.register_handler(Rc::new(Tag {
            priority,
            next: Next::new(),
        }));
    }
    channel.register_listener(Rc::new(Named("raw")));

    let log = CallLog::new();
    channel.invoke(|l| l.greet(&log));
    assert_eq!(log.entries(), vec!["tag 5", "tag 3", "tag 1", "raw"]);
}

// ----- listeners and updates declared through the derive -----

trait Scored {
    fn scored(&self, points: u32);
}

#[service(order = 2)]
#[derive(Default, Injectable)]
#[listens(dyn Scored)]
#[updatable]
struct Tally {
    total: Cell<u32>,
    ticks: Cell<u32>,
}

impl Scored for Tally {
    fn scored(&self, points: u32) {
        self.total.set(self.total.get() + points);
    }
}

impl Update for Tally {
    fn update(&self) {
        self.ticks.set(self.ticks.get() + 1);
    }
}

impl Service for Tally {}

#[derive(Default, Injectable)]
struct Scorer {
    #[inject(channel)]
    scored: Inject<Channel<dyn Scored>>,
}

#[test]
fn created_service_listens_and_updates() {
    let registry = Registry::new();
    registry.configure([Registration::of::<Tally>()]);

    let scorer = Rc::new(Scorer::default());
    registry.inject(&scorer, false, false);
    scorer.scored.with(|channel| channel.invoke(|l| l.scored(3)));
    registry.tick();

    let tally = registry.get::<Tally>().expect("tally");
    assert_eq!(tally.total.get(), 3);
    assert_eq!(tally.ticks.get(), 1);
}

#[test]
fn component_scoped_channel_without_local_bus_stays_unset() {
    let registry = Registry::new();
    let scorer = Rc::new(Scorer::default());
    registry.inject(&scorer, false, true);
    assert!(!scorer.scored.is_set());
}

// ----- global locator -----

#[test]
fn fake_locator_is_scoped_to_the_guard() {
    let before = Locator::current();
    {
        let guard = TestLocator::fake();
        guard.registry().register_instance(Rc::new(Alpha));
        assert!(Locator::get::<Alpha>().is_some());
    }
    let after = Locator::current();
    assert_eq!(before.is_some(), after.is_some());
}
