use std::{
    io::{self, stdin, stdout, Stdout, Write},
    sync::mpsc,
    thread::{self, JoinHandle},
};

use golbox::{config::MIN_CYCLE_DELAY, pos, Changes, Error, Event, Pos, RunState, SimConfig, SimHandle, Watch};
use log::{error, warn};
use termion::{
    color,
    event::{Event as TermEvent, Key, MouseButton, MouseEvent},
    input::{MouseTerminal, TermRead},
    raw::{IntoRawMode, RawTerminal},
    style,
};

type Terminal = MouseTerminal<RawTerminal<Stdout>>;

/// terminal position of cell (0, 0); the first row holds the status line.
const GRID_ORIGIN: Pos = pos!(1, 2);

pub struct View {
    thread: JoinHandle<()>,
}

impl View {
    pub fn spawn(handle: SimHandle) -> Self {
        let thread = thread::spawn(|| {
            if let Err(err) = view_loop(handle) {
                error!("view stopped: {err}");
            }
        });
        Self { thread }
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("view thread panicked");
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    fn offset(self) -> Pos {
        match self {
            Dir::Up => pos!(0, -1),
            Dir::Down => pos!(0, 1),
            Dir::Left => pos!(-1, 0),
            Dir::Right => pos!(1, 0),
        }
    }
}

#[derive(Debug)]
pub enum InputCmd {
    Exit,
    Move(Dir),
    PlayPause,
    Step,
    Reset,
    Accelerate,
    Decelerate,
    FlipCursor,
    Configure,
    /// raw terminal coordinates of a pointer press or drag.
    Paint { column: u16, row: u16, alive: bool },
}

enum ViewMsg {
    /// keys are interpreted by the view, they either drive commands or fill
    /// the configuration form.
    Key(Key),
    Input(InputCmd),
    Sim(Event),
}

fn command_for(key: Key) -> Option<InputCmd> {
    let command = match key {
        Key::Char('q') => InputCmd::Exit,
        Key::Char(' ') => InputCmd::PlayPause,
        Key::Char('n') => InputCmd::Step,
        Key::Char('r') => InputCmd::Reset,
        Key::Char('c') => InputCmd::Configure,
        Key::Char('+') => InputCmd::Accelerate,
        Key::Char('-') => InputCmd::Decelerate,
        Key::Char('\n') => InputCmd::FlipCursor,
        Key::Up => InputCmd::Move(Dir::Up),
        Key::Down => InputCmd::Move(Dir::Down),
        Key::Left => InputCmd::Move(Dir::Left),
        Key::Right => InputCmd::Move(Dir::Right),
        _ => return None,
    };
    Some(command)
}

const FORM_LABELS: [&str; 4] = ["rows", "columns", "cell side", "delay (s)"];

#[derive(Debug, PartialEq)]
enum FormStep {
    Editing,
    Cancel,
    Apply(golbox::Result<SimConfig>),
}

/// Status line form for the engine parameters, prefilled with the current
/// values. Enter moves to the next field and applies after the last one.
#[derive(Debug)]
struct Form {
    fields: [String; 4],
    current: usize,
}

impl Form {
    fn new((width, height): (usize, usize), cell_side: usize, cycle_delay: f64) -> Self {
        let fields = [
            height.to_string(),
            width.to_string(),
            cell_side.to_string(),
            cycle_delay.to_string(),
        ];
        Self { fields, current: 0 }
    }

    fn key(&mut self, key: Key) -> FormStep {
        match key {
            Key::Esc => return FormStep::Cancel,
            Key::Char('\n') if self.current + 1 == self.fields.len() => {
                let [rows, columns, cell_side, delay] = &self.fields;
                let config = SimConfig::from_fields(rows, columns, cell_side, delay);
                if config.is_err() {
                    self.current = 0;
                }
                return FormStep::Apply(config);
            }
            Key::Char('\n') | Key::Char('\t') => self.current = (self.current + 1) % self.fields.len(),
            Key::BackTab => self.current = (self.current + self.fields.len() - 1) % self.fields.len(),
            Key::Backspace => {
                self.fields[self.current].pop();
            }
            Key::Char(c) if !c.is_control() => self.fields[self.current].push(c),
            _ => (),
        }
        FormStep::Editing
    }

    fn render(&self) -> String {
        let fields = FORM_LABELS
            .iter()
            .zip(&self.fields)
            .enumerate()
            .map(|(index, (label, value))| {
                let marker = if index == self.current { ">" } else { " " };
                format!("{marker}{label} [{value}]")
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!("configure:{fields} | [enter] next/apply [tab] next [esc] cancel")
    }
}

fn input_loop(sender: mpsc::Sender<ViewMsg>) {
    // button held down during a drag: left paints, right erases.
    let mut painting = None;
    for event in stdin().events() {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                error!("failed to read input: {err}");
                break;
            }
        };
        let message = match event {
            TermEvent::Key(key) => ViewMsg::Key(key),
            TermEvent::Mouse(MouseEvent::Press(button, column, row)) => match button {
                MouseButton::Left | MouseButton::Right => {
                    let alive = matches!(button, MouseButton::Left);
                    painting = Some(alive);
                    ViewMsg::Input(InputCmd::Paint { column, row, alive })
                }
                MouseButton::WheelUp | MouseButton::WheelDown => ViewMsg::Input(InputCmd::Step),
                _ => continue,
            },
            TermEvent::Mouse(MouseEvent::Hold(column, row)) => match painting {
                Some(alive) => ViewMsg::Input(InputCmd::Paint { column, row, alive }),
                None => continue,
            },
            TermEvent::Mouse(MouseEvent::Release(..)) => {
                painting = None;
                continue;
            }
            _ => continue,
        };

        if sender.send(message).is_err() {
            break;
        }
    }
}

fn event_loop(events: mpsc::Receiver<Event>, sender: mpsc::Sender<ViewMsg>) {
    for event in events {
        if sender.send(ViewMsg::Sim(event)).is_err() {
            break;
        }
    }
}

/// Maps a pointer position to the cell under it, clipped to the active
/// area.
fn cell_at(column: u16, row: u16, cell_side: usize, (width, height): (usize, usize)) -> Option<Pos> {
    let relative = pos!(column as i32, row as i32) - GRID_ORIGIN;
    if relative.x < 0 || relative.y < 0 {
        return None;
    }
    let cell = pos!(relative.x / cell_side.max(1) as i32, relative.y);
    let inside = (cell.x as usize) < width && (cell.y as usize) < height;
    inside.then_some(cell)
}

struct Screen {
    out: Terminal,
    /// live cells as of the last event received.
    visible: Changes,
    dimensions: (usize, usize),
    cell_side: usize,
    cursor: Pos,
    generation: u64,
    /// terminal size as of the last repaint.
    size: (u16, u16),
    form: Option<Form>,
    /// last configuration error, shown until the next key.
    message: Option<String>,
}

impl Screen {
    fn cell_text(&self, pos: Pos) -> String {
        let glyph = if self.visible.contains(&pos) { "#" } else { "." };
        glyph.repeat(self.cell_side.max(1))
    }

    /// terminal cell of a grid position, `None` when off screen.
    fn goto(&self, pos: Pos) -> Option<termion::cursor::Goto> {
        let (columns, rows) = self.size;
        let column = GRID_ORIGIN.x as usize + pos.x as usize * self.cell_side.max(1);
        let row = GRID_ORIGIN.y as usize + pos.y as usize;
        let fits = column + self.cell_side.max(1) - 1 <= columns as usize && row <= rows as usize;
        fits.then(|| termion::cursor::Goto(column as u16, row as u16))
    }

    fn draw_cell(&mut self, pos: Pos) -> io::Result<()> {
        let Some(goto) = self.goto(pos) else {
            return Ok(());
        };
        let text = self.cell_text(pos);
        if pos == self.cursor {
            write!(self.out, "{goto}{}{text}{}", style::Invert, style::Reset)
        } else if self.visible.contains(&pos) {
            let live = color::Fg(color::LightCyan);
            write!(self.out, "{goto}{live}{text}{}", color::Fg(color::Reset))
        } else {
            write!(self.out, "{goto}{text}")
        }
    }

    fn repaint(&mut self) -> io::Result<()> {
        self.size = termion::terminal_size().unwrap_or((80, 24));
        write!(self.out, "{}", termion::clear::All)?;
        let (width, height) = self.dimensions;
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                self.draw_cell(pos!(x, y))?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, event: Event) -> io::Result<()> {
        match event {
            Event::Step {
                generation,
                changes,
            } => {
                self.generation = generation;
                self.flip(changes)
            }
            Event::Edit(changes) => self.flip(changes),
            Event::Clear(changes) => {
                self.generation = 0;
                self.flip(changes)
            }
            Event::Resize {
                width,
                height,
                cell_side,
            } => {
                self.dimensions = (width, height);
                self.cell_side = cell_side;
                self.visible.clear();
                self.cursor = pos!(0, 0);
                self.repaint()
            }
        }
    }

    /// every changed cell flipped state.
    fn flip(&mut self, changes: Changes) -> io::Result<()> {
        for pos in changes {
            if !self.visible.remove(&pos) {
                self.visible.insert(pos);
            }
            self.draw_cell(pos)?;
        }
        Ok(())
    }

    fn move_cursor(&mut self, dir: Dir) -> io::Result<()> {
        let (width, height) = self.dimensions;
        let next = self.cursor + dir.offset();
        let inside = next.x >= 0 && next.y >= 0 && (next.x as usize) < width && (next.y as usize) < height;
        if inside {
            let previous = self.cursor;
            self.cursor = next;
            self.draw_cell(previous)?;
            self.draw_cell(next)?;
        }
        Ok(())
    }

    fn draw_status(&mut self, handle: &SimHandle) -> io::Result<()> {
        let state = match handle.run_state() {
            RunState::Running => "running",
            RunState::Paused => "paused",
        };
        let (width, height) = self.dimensions;
        let line = match &self.form {
            Some(form) => form.render(),
            None => format!(
                "generation {} | population {} | {state} | delay {:?} | {width}x{height} | [space] play/pause [n] step [r] reset [c] configure [+/-] speed [q] quit",
                self.generation,
                self.visible.len(),
                handle.cycle_delay(),
            ),
        };
        let goto = termion::cursor::Goto(1, 1);
        let clear = termion::clear::CurrentLine;
        match &self.message {
            Some(message) => {
                let red = color::Fg(color::Red);
                let reset = color::Fg(color::Reset);
                write!(self.out, "{goto}{clear}{red}{message}{reset} | {line}")?;
            }
            None => write!(self.out, "{goto}{clear}{line}")?,
        }
        self.out.flush()
    }
}

fn view_loop(handle: SimHandle) -> io::Result<()> {
    let (sender, receiver) = mpsc::channel();
    let Watch {
        grid,
        generation,
        cell_side,
        events,
    } = handle.watch();
    let event_sender = sender.clone();
    let _event_handle = thread::spawn(move || event_loop(events, event_sender));

    // raw mode and mouse reporting are restored when `out` drops.
    let out = MouseTerminal::from(stdout().into_raw_mode()?);
    let _input_handle = thread::spawn(|| input_loop(sender));

    let mut screen = Screen {
        out,
        visible: grid.actives().into_iter().collect(),
        dimensions: grid.dimensions(),
        cell_side,
        cursor: pos!(0, 0),
        generation,
        size: (0, 0),
        form: None,
        message: None,
    };
    write!(screen.out, "{}", termion::cursor::Hide)?;
    screen.repaint()?;
    screen.draw_status(&handle)?;

    for message in receiver {
        match message {
            ViewMsg::Sim(event) => screen.apply(event)?,
            ViewMsg::Key(key) => {
                if screen.form.is_some() {
                    handle_form(&handle, &mut screen, key);
                } else {
                    match command_for(key) {
                        Some(InputCmd::Exit) => break,
                        Some(cmd) => handle_input(&handle, &mut screen, cmd)?,
                        None => (),
                    }
                }
            }
            ViewMsg::Input(cmd) => handle_input(&handle, &mut screen, cmd)?,
        }
        screen.draw_status(&handle)?;
    }

    write!(screen.out, "{}{}", termion::clear::All, termion::cursor::Show)?;
    screen.out.flush()
}

fn handle_input(handle: &SimHandle, screen: &mut Screen, cmd: InputCmd) -> io::Result<()> {
    match cmd {
        InputCmd::Exit => (),
        InputCmd::Move(dir) => screen.move_cursor(dir)?,
        InputCmd::PlayPause => {
            handle.toggle();
        }
        InputCmd::Step => handle.step_once(),
        InputCmd::Reset => handle.reset(),
        InputCmd::Accelerate => change_speed(handle, 0.5),
        InputCmd::Decelerate => change_speed(handle, 2.0),
        InputCmd::Configure => {
            let delay = handle.cycle_delay().as_secs_f64();
            screen.form = Some(Form::new(screen.dimensions, screen.cell_side, delay));
            screen.message = None;
        }
        InputCmd::FlipCursor => {
            let Pos { x, y } = screen.cursor;
            edit(handle, x, y, !screen.visible.contains(&screen.cursor));
        }
        InputCmd::Paint { column, row, alive } => {
            if let Some(Pos { x, y }) = cell_at(column, row, screen.cell_side, screen.dimensions) {
                edit(handle, x, y, alive);
            }
        }
    }
    Ok(())
}

/// invalid values keep the form open with the error on the status line.
fn handle_form(handle: &SimHandle, screen: &mut Screen, key: Key) {
    let Some(form) = screen.form.as_mut() else {
        return;
    };
    screen.message = None;
    match form.key(key) {
        FormStep::Editing => (),
        FormStep::Cancel => screen.form = None,
        FormStep::Apply(Ok(config)) => {
            screen.form = None;
            handle.configure(config);
        }
        FormStep::Apply(Err(err)) => {
            warn!("rejected configuration: {err}");
            screen.message = Some(err.to_string());
        }
    }
}

fn change_speed(handle: &SimHandle, factor: f64) {
    let delay = handle.cycle_delay().mul_f64(factor).max(MIN_CYCLE_DELAY);
    handle.set_cycle_delay(delay.as_secs_f64());
}

/// out of range edits come from stale pointer input and are dropped.
fn edit(handle: &SimHandle, x: i32, y: i32, alive: bool) {
    match handle.edit_cell(x, y, alive) {
        Ok(_) => (),
        Err(err @ Error::OutOfRange { .. }) => warn!("ignored pointer edit: {err}"),
        Err(err) => error!("edit failed: {err}"),
    }
}

#[test]
fn test_cell_at() {
    let dimensions = (10, 5);
    assert_eq!(cell_at(1, 2, 2, dimensions), Some(pos!(0, 0)));
    assert_eq!(cell_at(2, 2, 2, dimensions), Some(pos!(0, 0)));
    assert_eq!(cell_at(3, 3, 2, dimensions), Some(pos!(1, 1)));
    assert_eq!(cell_at(20, 6, 2, dimensions), Some(pos!(9, 4)));
    assert_eq!(cell_at(21, 6, 2, dimensions), None);
    assert_eq!(cell_at(1, 7, 2, dimensions), None);
    // status line
    assert_eq!(cell_at(1, 1, 2, dimensions), None);
}

#[test]
fn test_dir_offset() {
    assert_eq!(pos!(3, 3) + Dir::Up.offset(), pos!(3, 2));
    assert_eq!(pos!(3, 3) + Dir::Left.offset(), pos!(2, 3));
}

#[test]
fn test_command_for() {
    assert!(matches!(command_for(Key::Char('c')), Some(InputCmd::Configure)));
    assert!(matches!(command_for(Key::Char('q')), Some(InputCmd::Exit)));
    assert!(matches!(command_for(Key::Up), Some(InputCmd::Move(Dir::Up))));
    assert!(command_for(Key::Char('z')).is_none());
}

#[cfg(test)]
fn type_into(form: &mut Form, text: &str) -> FormStep {
    let mut step = FormStep::Editing;
    for c in text.chars() {
        step = form.key(Key::Char(c));
    }
    step
}

#[test]
fn test_form_applies_fields() {
    let mut form = Form::new((190, 80), 10, 0.1);
    assert_eq!(form.fields, ["80", "190", "10", "0.1"].map(String::from));
    form.key(Key::Backspace);
    form.key(Key::Backspace);
    assert_eq!(type_into(&mut form, "5\n7\n"), FormStep::Editing);
    form.key(Key::Backspace);
    assert_eq!(type_into(&mut form, "3\n"), FormStep::Editing);
    let step = type_into(&mut form, "\n");
    assert_eq!(step, FormStep::Apply(SimConfig::new((1907, 5), 13, 0.1)));
}

#[test]
fn test_form_rejects_invalid() {
    let mut form = Form::new((10, 10), 2, 0.1);
    form.key(Key::Backspace);
    form.key(Key::Backspace);
    type_into(&mut form, "0\n\n\n");
    let step = type_into(&mut form, "\n");
    assert!(matches!(step, FormStep::Apply(Err(Error::InvalidConfiguration(_)))));
    assert_eq!(form.current, 0);
    assert_eq!(form.key(Key::Esc), FormStep::Cancel);
}

#[test]
fn test_form_clamps_delay() {
    let mut form = Form::new((4, 3), 1, 0.1);
    for _ in 0..3 {
        form.key(Key::Char('\t'));
    }
    for _ in 0..3 {
        form.key(Key::Backspace);
    }
    let step = type_into(&mut form, "-1\n");
    assert_eq!(step, FormStep::Apply(SimConfig::new((4, 3), 1, 0.0)));
}
