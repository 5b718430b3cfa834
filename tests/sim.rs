use std::{
    collections::HashSet,
    error::Error,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use golbox::{config::MIN_CYCLE_DELAY, pos, Event, Pos, RunState, Sim, SimConfig};

fn small(width: usize, height: usize) -> Result<SimConfig, Box<dyn Error>> {
    Ok(SimConfig::new((width, height), 1, 0.0)?)
}

fn next_step(events: &mpsc::Receiver<Event>) -> Option<(u64, usize)> {
    loop {
        match events.recv_timeout(Duration::from_secs(5)).ok()? {
            Event::Step {
                generation,
                changes,
            } => return Some((generation, changes.len())),
            _ => continue,
        }
    }
}

#[test]
fn starts_paused() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(5, 5)?);
    assert_eq!(sim.run_state(), RunState::Paused);
    assert_eq!(sim.dimensions(), (5, 5));
    assert_eq!(sim.cycle_delay(), MIN_CYCLE_DELAY);
    sim.edit_cell(1, 1, true)?;
    thread::sleep(Duration::from_millis(200));
    assert_eq!(sim.generation(), 0);
    assert!(sim.is_alive(1, 1));
    Ok(())
}

#[test]
fn blinker_through_manual_steps() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(5, 5)?);
    let events = sim.subscribe();
    for (x, y) in [(1, 0), (1, 1), (1, 2)] {
        assert!(sim.edit_cell(x, y, true)?);
    }
    sim.step_once();
    assert_eq!(sim.actives(), vec![pos!(0, 1), pos!(1, 1), pos!(2, 1)]);
    sim.step_once();
    assert_eq!(sim.actives(), vec![pos!(1, 0), pos!(1, 1), pos!(1, 2)]);
    assert_eq!(sim.generation(), 2);

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(received.len(), 5);
    assert!(matches!(received[3], Event::Step { generation: 1, .. }));
    assert!(matches!(received[4], Event::Step { generation: 2, .. }));
    Ok(())
}

#[test]
fn driver_steps_while_running() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(5, 5)?);
    let events = sim.subscribe();
    for (x, y) in [(1, 0), (1, 1), (1, 2)] {
        sim.edit_cell(x, y, true)?;
    }
    sim.start();
    assert_eq!(next_step(&events), Some((1, 4)));
    assert_eq!(next_step(&events), Some((2, 4)));
    sim.pause();
    assert_eq!(sim.run_state(), RunState::Paused);

    // a step in flight when pausing still completes; nothing starts after it.
    let settled = sim.generation();
    thread::sleep(MIN_CYCLE_DELAY * 4);
    assert_eq!(sim.generation(), settled);

    sim.resume();
    let (generation, _) = next_step(&events).ok_or("no step after resume")?;
    assert!(generation > settled);
    Ok(())
}

#[test]
fn start_and_pause_are_idempotent() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(3, 3)?);
    sim.pause();
    assert_eq!(sim.run_state(), RunState::Paused);
    sim.start();
    sim.start();
    assert_eq!(sim.run_state(), RunState::Running);
    assert_eq!(sim.toggle(), RunState::Paused);
    assert_eq!(sim.toggle(), RunState::Running);
    Ok(())
}

#[test]
fn manual_step_while_running() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(4, 4)?);
    sim.start();
    for _ in 0..20 {
        sim.step_once();
    }
    sim.pause();
    assert!(sim.generation() >= 20);
    Ok(())
}

#[test]
fn reset_always_pauses() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(6, 6)?);
    for run_first in [false, true] {
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1), (4, 4)] {
            sim.edit_cell(x, y, true)?;
        }
        if run_first {
            sim.start();
        }
        sim.reset();
        assert_eq!(sim.run_state(), RunState::Paused);
        assert_eq!(sim.population(), 0);
        assert_eq!(sim.generation(), 0);
        sim.reset();
        assert_eq!(sim.population(), 0);
    }
    Ok(())
}

#[test]
fn customize_while_running() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(5, 5)?);
    let events = sim.subscribe();
    for (x, y) in [(1, 0), (1, 1), (1, 2)] {
        sim.edit_cell(x, y, true)?;
    }
    sim.start();
    next_step(&events).ok_or("driver never stepped")?;

    sim.customize(3, (8, 4), 0.5)?;
    assert_eq!(sim.run_state(), RunState::Paused);
    assert_eq!(sim.dimensions(), (8, 4));
    assert_eq!(sim.cell_side(), 3);
    assert_eq!(sim.cycle_delay(), Duration::from_millis(500));
    assert_eq!(sim.population(), 0);
    assert_eq!(sim.generation(), 0);
    assert!(sim.edit_cell(7, 3, true)?);

    let last_resize = events.try_iter().filter_map(|event| match event {
        Event::Resize {
            width,
            height,
            cell_side,
        } => Some((width, height, cell_side)),
        _ => None,
    });
    assert_eq!(last_resize.last(), Some((8, 4, 3)));
    Ok(())
}

#[test]
fn configure_clamps_delay() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(SimConfig::default());
    assert_eq!(sim.dimensions(), (190, 80));
    sim.configure(SimConfig::from_fields("2", "3", "4", "-0.5")?);
    assert_eq!(sim.dimensions(), (3, 2));
    assert_eq!(sim.cell_side(), 4);
    assert_eq!(sim.cycle_delay(), MIN_CYCLE_DELAY);

    sim.customize(1, (3, 2), 0.0)?;
    assert_eq!(sim.cycle_delay(), MIN_CYCLE_DELAY);
    assert_eq!(sim.set_cycle_delay(0.25), Duration::from_millis(250));
    Ok(())
}

#[test]
fn edit_out_of_range() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(4, 4)?);
    let events = sim.subscribe();
    assert!(matches!(
        sim.edit_cell(4, 0, true),
        Err(golbox::Error::OutOfRange { .. })
    ));
    assert!(sim.edit_cell(-1, 2, false).is_err());
    assert!(!sim.edit_cell(0, 0, false)?);
    assert!(events.try_recv().is_err());
    Ok(())
}

#[test]
fn watch_starts_from_current_grid() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(4, 4)?);
    sim.edit_cell(2, 2, true)?;
    sim.step_once();
    let watch = sim.watch();
    assert_eq!(watch.generation, 1);
    assert_eq!(watch.grid.population(), 0);
    assert_eq!(watch.cell_side, 1);
    assert!(watch.events.try_recv().is_err());
    Ok(())
}

#[test]
fn shutdown_stops_driver() -> Result<(), Box<dyn Error>> {
    let mut sim = Sim::spawn(small(4, 4)?);
    sim.set_cycle_delay(10.0);
    sim.start();
    let started = Instant::now();
    sim.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));

    let generation = sim.generation();
    thread::sleep(MIN_CYCLE_DELAY * 2);
    assert_eq!(sim.generation(), generation);
    sim.step_once();
    assert_eq!(sim.generation(), generation + 1);
    Ok(())
}

/// Replays the event stream into a mirror; any lost update or torn step
/// would make the mirror diverge from the final grid.
#[test]
fn concurrent_edits_and_steps() -> Result<(), Box<dyn Error>> {
    let (width, height) = (24, 16);
    let mut sim = Sim::spawn(small(width, height)?);
    let events = sim.subscribe();
    sim.start();

    let editors: Vec<_> = (0..4)
        .map(|seed| {
            let handle = sim.handle();
            thread::spawn(move || {
                let mut value: u32 = seed * 7919 + 1;
                for i in 0..500 {
                    value = value.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    let x = (value >> 8) as i32 % width as i32;
                    let y = (value >> 16) as i32 % height as i32;
                    handle.edit_cell(x, y, i % 3 != 0).expect("edit in range");
                    if i % 50 == 0 {
                        handle.step_once();
                    }
                }
            })
        })
        .collect();
    for editor in editors {
        editor.join().map_err(|_| "editor panicked")?;
    }

    sim.shutdown();
    let expected: HashSet<Pos> = sim.actives().into_iter().collect();
    let grid = sim.snapshot();
    drop(sim);

    let mut mirror = HashSet::new();
    let mut last_generation = 0;
    for event in events {
        let changes = match event {
            Event::Step {
                generation,
                changes,
            } => {
                assert_eq!(generation, last_generation + 1);
                last_generation = generation;
                changes
            }
            Event::Edit(changes) | Event::Clear(changes) => changes,
            Event::Resize { .. } => unreachable!(),
        };
        for pos in changes {
            if !mirror.remove(&pos) {
                mirror.insert(pos);
            }
        }
    }

    assert_eq!(mirror, expected);
    assert_eq!(grid.population(), expected.len());
    assert!(expected
        .iter()
        .all(|p| p.x >= 0 && p.y >= 0 && (p.x as usize) < width && (p.y as usize) < height));
    Ok(())
}

#[test]
fn customize_rejects_oversized_grid() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(5, 5)?);
    sim.edit_cell(2, 2, true)?;
    sim.start();
    for (size, side) in [((usize::MAX, 1), 1), ((4_294_967_297, 1), 1), ((5000, 5000), 1), ((3, 3), 0)] {
        assert!(matches!(
            sim.customize(side, size, 0.1),
            Err(golbox::Error::InvalidConfiguration(_))
        ));
    }
    assert_eq!(sim.dimensions(), (5, 5));
    assert_eq!(sim.run_state(), RunState::Running);
    Ok(())
}

/// Another thread keeps restarting and stepping the engine while it is
/// reconfigured; every resize must directly follow its clear.
#[test]
fn customize_is_one_grid_operation() -> Result<(), Box<dyn Error>> {
    let sim = Sim::spawn(small(6, 6)?);
    let events = sim.subscribe();
    sim.start();

    let restarter = {
        let handle = sim.handle();
        thread::spawn(move || {
            for _ in 0..2000 {
                handle.start();
                handle.step_once();
            }
        })
    };
    for round in 0..100 {
        sim.edit_cell(1, 1, true)?;
        sim.edit_cell(2, 1, true)?;
        sim.edit_cell(3, 1, true)?;
        sim.customize(1, (6 + round % 2, 6), 0.0)?;
    }
    restarter.join().map_err(|_| "restarter panicked")?;

    sim.customize(1, (4, 4), 0.0)?;
    assert_eq!(sim.run_state(), RunState::Paused);
    assert_eq!(sim.population(), 0);

    let received: Vec<_> = events.try_iter().collect();
    let resizes = received
        .iter()
        .enumerate()
        .filter(|(_, event)| matches!(event, Event::Resize { .. }));
    for (index, _) in resizes {
        assert!(index > 0);
        assert!(matches!(received[index - 1], Event::Clear(_)));
    }
    Ok(())
}
