//! Loopback tests against real multicast sockets. The default provider
//! TTL of zero keeps every packet on the local host; each test uses its
//! own port so runs do not hear each other.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use lcm::{Error, Lcm};

fn client(port: u16) -> Lcm {
    Lcm::with_url(&format!("udpm://239.255.76.67:{port}?ttl=0")).expect("multicast socket setup")
}

/// Pump the receive path until `done` reports true or `deadline`
/// passes.
fn pump_until(lcm: &mut Lcm, deadline: Duration, done: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        lcm.handle_timeout(Duration::from_millis(200)).unwrap();
    }
    done()
}

#[test]
fn a_short_message_round_trips_bytewise() {
    let mut lcm = client(17_667);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    lcm.subscribe("TEST", move |channel, payload| {
        sink.borrow_mut().push((channel.to_owned(), payload.to_vec()));
    })
    .unwrap();

    lcm.publish("TEST", &[1, 2, 3, 4, 5]).unwrap();
    assert!(pump_until(&mut lcm, Duration::from_secs(10), || {
        !seen.borrow().is_empty()
    }));
    assert_eq!(*seen.borrow(), [("TEST".to_owned(), vec![1, 2, 3, 4, 5])]);
}

#[test]
fn patterns_filter_channels() {
    let mut lcm = client(17_668);
    let sensors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&sensors);
    lcm.subscribe("SENSOR_.*", move |channel, _| {
        sink.borrow_mut().push(channel.to_owned());
    })
    .unwrap();
    let all = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&all);
    lcm.subscribe(".*", move |_, _| *counter.borrow_mut() += 1)
        .unwrap();

    lcm.publish("SENSOR_1", b"a").unwrap();
    lcm.publish("OTHER", b"b").unwrap();
    lcm.publish("SENSOR_2", b"c").unwrap();

    assert!(pump_until(&mut lcm, Duration::from_secs(10), || {
        *all.borrow() == 3
    }));
    assert_eq!(*sensors.borrow(), ["SENSOR_1", "SENSOR_2"]);
}

#[test]
fn a_large_message_reassembles_intact() {
    let mut lcm = client(17_669);
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let seen: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    lcm.subscribe("BIG", move |_, payload| {
        *sink.borrow_mut() = Some(payload.to_vec());
    })
    .unwrap();

    lcm.publish("BIG", &payload).unwrap();
    assert!(pump_until(&mut lcm, Duration::from_secs(10), || {
        seen.borrow().is_some()
    }));
    assert_eq!(seen.borrow().as_deref(), Some(payload.as_slice()));
}

#[test]
fn both_framing_paths_deliver_at_the_boundary() {
    let mut lcm = client(17_670);
    let lengths = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lengths);
    lcm.subscribe("B", move |_, payload| sink.borrow_mut().push(payload.len()))
        .unwrap();

    // 65497 bytes is the largest payload the short path takes on this
    // channel; 65498 forces fragmentation.
    lcm.publish("B", &vec![0xaa; 65_497]).unwrap();
    lcm.publish("B", &vec![0xbb; 65_498]).unwrap();

    assert!(pump_until(&mut lcm, Duration::from_secs(10), || {
        lengths.borrow().len() == 2
    }));
    assert_eq!(*lengths.borrow(), [65_497, 65_498]);
}

#[test]
fn channel_length_limits_are_enforced() {
    let mut lcm = client(17_671);
    let ok = "c".repeat(63);
    let long = "c".repeat(64);
    lcm.publish(&ok, b"fits").unwrap();
    assert!(matches!(
        lcm.publish(&long, b"nope"),
        Err(Error::ChannelNameTooLong(64))
    ));
}

#[test]
fn unsubscribe_takes_effect_for_later_deliveries() {
    let mut lcm = client(17_672);
    let count = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&count);
    let handle = lcm
        .subscribe("C", move |_, _| *counter.borrow_mut() += 1)
        .unwrap();
    let total = Rc::new(RefCell::new(0usize));
    let total_counter = Rc::clone(&total);
    lcm.subscribe("C", move |_, _| *total_counter.borrow_mut() += 1)
        .unwrap();

    lcm.publish("C", b"1").unwrap();
    assert!(pump_until(&mut lcm, Duration::from_secs(10), || {
        *total.borrow() == 1
    }));

    lcm.unsubscribe(handle).unwrap();
    lcm.publish("C", b"2").unwrap();
    assert!(pump_until(&mut lcm, Duration::from_secs(10), || {
        *total.borrow() == 2
    }));
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn close_makes_the_instance_unusable() {
    let mut lcm = client(17_673);
    lcm.close();
    assert!(lcm.is_closed());

    assert!(matches!(lcm.publish("C", b"x"), Err(Error::InstanceClosed)));
    assert!(matches!(
        lcm.subscribe("C", |_, _| {}),
        Err(Error::InstanceClosed)
    ));
    assert!(matches!(lcm.handle(), Err(Error::InstanceClosed)));
    assert!(matches!(
        lcm.handle_timeout(Duration::from_millis(1)),
        Err(Error::InstanceClosed)
    ));

    // Idempotent.
    lcm.close();
    assert!(lcm.is_closed());
}
