use std::{
    ops::Deref,
    sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info, trace};

use crate::{
    config::{clamp_cycle_delay, SimConfig},
    error::Result,
    pos, Changes, Grid, Pos,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Paused,
    Running,
}

/// Notifications sent to subscribers once a mutation is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Step { generation: u64, changes: Changes },
    Edit(Changes),
    Clear(Changes),
    /// the grid was reallocated, every cell is dead.
    Resize {
        width: usize,
        height: usize,
        cell_side: usize,
    },
}

/// Starting point for a renderer that keeps its own copy of the grid.
#[derive(Debug)]
pub struct Watch {
    pub grid: Grid,
    pub generation: u64,
    pub cell_side: usize,
    pub events: mpsc::Receiver<Event>,
}

#[derive(Debug)]
struct State {
    grid: Grid,
    cell_side: usize,
    generation: u64,
    subscribers: Vec<mpsc::Sender<Event>>,
}

impl State {
    fn emit(&mut self, event: Event) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn step(&mut self) {
        let changes = self.grid.step();
        self.generation += 1;
        debug!(
            "generation {} computed, {} cells changed",
            self.generation,
            changes.len()
        );
        let generation = self.generation;
        self.emit(Event::Step {
            generation,
            changes,
        });
    }

    fn clear(&mut self) {
        let changes = self.grid.clear();
        self.generation = 0;
        self.emit(Event::Clear(changes));
    }
}

#[derive(Debug)]
struct Control {
    run_state: RunState,
    cycle_delay: Duration,
    shutdown: bool,
}

/// `state` may be held while taking `control`, never the reverse.
#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    control: Mutex<Control>,
    wake: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable access to a running simulation.
///
/// Every grid operation takes the grid lock for its whole duration, so
/// automatic steps, manual steps, edits and reconfiguration never overlap.
#[derive(Debug, Clone)]
pub struct SimHandle {
    shared: Arc<Shared>,
}

impl SimHandle {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.shared.state)
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        lock(&self.shared.control)
    }

    fn set_run_state(&self, run_state: RunState) {
        let mut control = self.control();
        if control.run_state != run_state {
            info!("simulation {run_state:?}");
            control.run_state = run_state;
            self.shared.wake.notify_all();
        }
    }

    pub fn start(&self) {
        self.set_run_state(RunState::Running)
    }

    pub fn resume(&self) {
        self.start()
    }

    /// lets a step in flight finish, only the next one is held back.
    pub fn pause(&self) {
        self.set_run_state(RunState::Paused)
    }

    pub fn toggle(&self) -> RunState {
        let next = match self.run_state() {
            RunState::Paused => RunState::Running,
            RunState::Running => RunState::Paused,
        };
        self.set_run_state(next);
        next
    }

    pub fn reset(&self) {
        let mut state = self.state();
        self.set_run_state(RunState::Paused);
        state.clear();
        info!("simulation reset");
    }

    /// Rebuilds the grid at new dimensions. Always destructive and always
    /// leaves the simulation paused. Invalid parameters are rejected before
    /// anything is touched.
    pub fn customize(&self, cell_side: usize, array_size: (usize, usize), cycle_delay: f64) -> Result<()> {
        let config = SimConfig::new(array_size, cell_side, cycle_delay)?;
        self.configure(config);
        Ok(())
    }

    pub fn configure(&self, config: SimConfig) {
        let (width, height) = config.array_size();
        let cell_side = config.cell_side();
        let cycle_delay = config.cycle_delay();

        // a single grid lock hold, so no step or edit lands between the
        // clear and the resize, and no start slips in before the pause.
        let mut state = self.state();
        self.set_run_state(RunState::Paused);
        state.clear();
        state.grid.resize(width, height);
        state.cell_side = cell_side;
        self.control().cycle_delay = cycle_delay;
        state.emit(Event::Resize {
            width,
            height,
            cell_side,
        });
        info!("simulation customized to {width}x{height}, cell side {cell_side}, delay {cycle_delay:?}");
    }

    /// takes effect from the next sleep interval.
    pub fn set_cycle_delay(&self, seconds: f64) -> Duration {
        let cycle_delay = clamp_cycle_delay(seconds);
        self.control().cycle_delay = cycle_delay;
        cycle_delay
    }

    pub fn step_once(&self) {
        self.state().step();
    }

    pub fn edit_cell(&self, x: i32, y: i32, alive: bool) -> Result<bool> {
        let mut state = self.state();
        let pos = pos!(x, y);
        let changed = if alive {
            state.grid.activate(x, y)?
        } else {
            state.grid.deactivate(x, y)?
        };
        if changed {
            trace!("cell {pos} set to {alive}");
            state.emit(Event::Edit(Changes::from_iter([pos])));
        }
        Ok(changed)
    }

    /// receives every event emitted after this call, in mutation order.
    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (sender, receiver) = mpsc::channel();
        self.state().subscribers.push(sender);
        receiver
    }

    /// Current grid and a receiver for every later event, taken under the
    /// same lock so no mutation is missed or seen twice.
    pub fn watch(&self) -> Watch {
        let (sender, events) = mpsc::channel();
        let mut state = self.state();
        state.subscribers.push(sender);
        Watch {
            grid: state.grid.clone(),
            generation: state.generation,
            cell_side: state.cell_side,
            events,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.control().run_state
    }

    pub fn cycle_delay(&self) -> Duration {
        self.control().cycle_delay
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.state().grid.dimensions()
    }

    pub fn cell_side(&self) -> usize {
        self.state().cell_side
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    pub fn population(&self) -> usize {
        self.state().grid.population()
    }

    pub fn is_alive(&self, x: i32, y: i32) -> bool {
        self.state().grid.is_alive(x, y)
    }

    pub fn actives(&self) -> Vec<Pos> {
        self.state().grid.actives()
    }

    pub fn snapshot(&self) -> Grid {
        self.state().grid.clone()
    }
}

/// Owns the cycle driver thread. Dereferences to its [`SimHandle`].
#[derive(Debug)]
pub struct Sim {
    thread: Option<JoinHandle<()>>,
    handle: SimHandle,
}

impl Sim {
    pub fn spawn(config: SimConfig) -> Self {
        let (width, height) = config.array_size();
        let state = State {
            grid: Grid::new(width, height),
            cell_side: config.cell_side(),
            generation: 0,
            subscribers: vec![],
        };
        let control = Control {
            run_state: RunState::Paused,
            cycle_delay: config.cycle_delay(),
            shutdown: false,
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            control: Mutex::new(control),
            wake: Condvar::new(),
        });

        let handle = SimHandle { shared };
        let driver = handle.clone();
        let thread = thread::spawn(move || sim_loop(driver));
        info!("simulation spawned with a {width}x{height} grid");

        Self {
            thread: Some(thread),
            handle,
        }
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    /// Stops the cycle driver and waits for it. Handles stay usable for
    /// manual operations afterwards.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.handle.control().shutdown = true;
            self.handle.shared.wake.notify_all();
            if thread.join().is_err() {
                error!("simulation driver panicked");
            }
            info!("simulation driver stopped");
        }
    }
}

impl Deref for Sim {
    type Target = SimHandle;
    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// waits while paused, returns `false` on shutdown.
fn wait_running(handle: &SimHandle) -> bool {
    let shared = &handle.shared;
    let control = shared
        .wake
        .wait_while(handle.control(), |control| {
            control.run_state == RunState::Paused && !control.shutdown
        })
        .unwrap_or_else(PoisonError::into_inner);
    !control.shutdown
}

/// sleeps for `delay`, returns `false` if woken for shutdown.
fn sleep(handle: &SimHandle, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    let mut control = handle.control();
    loop {
        if control.shutdown {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        control = handle
            .shared
            .wake
            .wait_timeout(control, deadline - now)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}

fn sim_loop(handle: SimHandle) {
    while wait_running(&handle) {
        {
            // a pause issued before the grid lock was taken holds this step back.
            let mut state = handle.state();
            if handle.run_state() != RunState::Running {
                continue;
            }
            state.step();
        }
        let delay = handle.cycle_delay();
        if !sleep(&handle, delay) {
            break;
        }
    }
}
