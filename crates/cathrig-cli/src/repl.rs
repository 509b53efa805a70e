//! REPL – the operator shell for the rig.
//!
//! Supported slash-commands:
//!   /help                               – show this list
//!   /home                               – home the transports
//!   /move <steps>                       – interlocked move of the bottom transport
//!   /sync <top> <bottom>                – synchronized move of both transports
//!   /jaw                                – stroke the primary clamp jaw
//!   /grip <catheter|guidewire> <clamp|release>
//!   /status                             – positions and grip states
//!   /events                             – drain the motion journal as JSON lines
//!   /quit | /exit                       – exit the shell

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cathrig_hal::SimRig;
use cathrig_kernel::ClampSystem;
use cathrig_types::{Device, GripState, RigError};

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Home,
    Move(i64),
    Sync { top: i64, bottom: i64 },
    Jaw,
    Grip(Device, GripState),
    Status,
    Events,
    Quit,
}

/// Parse one line of input. Errors carry the message shown to the operator.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();
    let steps = |s: &str| s.parse::<i64>().map_err(|_| format!("'{s}' is not a step count"));

    match (head, args.as_slice()) {
        ("/help", []) => Ok(Command::Help),
        ("/home", []) => Ok(Command::Home),
        ("/move", [n]) => Ok(Command::Move(steps(*n)?)),
        ("/sync", [top, bottom]) => Ok(Command::Sync {
            top: steps(*top)?,
            bottom: steps(*bottom)?,
        }),
        ("/jaw", []) => Ok(Command::Jaw),
        ("/grip", [device, state]) => {
            let device = match *device {
                "catheter" => Device::Catheter,
                "guidewire" => Device::Guidewire,
                other => return Err(format!("unknown device '{other}'")),
            };
            let state = match *state {
                "clamp" => GripState::Clamped,
                "release" => GripState::Released,
                other => return Err(format!("unknown grip action '{other}'")),
            };
            Ok(Command::Grip(device, state))
        }
        ("/status", []) => Ok(Command::Status),
        ("/events", []) => Ok(Command::Events),
        ("/quit" | "/exit", []) => Ok(Command::Quit),
        ("/move" | "/sync" | "/grip" | "/help" | "/home" | "/jaw" | "/status" | "/events" | "/quit" | "/exit", _) => {
            Err(format!("wrong arguments for {head}"))
        }
        (other, _) => Err(format!("unknown command '{other}'")),
    }
}

/// Shell state that outlives a single command.
pub struct Session<'a> {
    system: &'a mut ClampSystem,
    sim: &'a SimRig,
    jaw_released: bool,
}

impl<'a> Session<'a> {
    pub fn new(system: &'a mut ClampSystem, sim: &'a SimRig) -> Self {
        Self {
            system,
            sim,
            jaw_released: true,
        }
    }

    /// Run one command against the rig.
    pub fn execute(&mut self, command: &Command) -> Result<(), RigError> {
        self.system.guard().reset();
        match command {
            Command::Help => cmd_help(),
            Command::Home => {
                let report = self.system.home()?;
                println!("{} in {} ms", "Homed".green(), report.seek_ms);
                for (axis, position) in &report.positions {
                    println!("  {:<8} {}", axis, position.to_string().bold());
                }
            }
            Command::Move(steps) => {
                let distance = self.system.move_relative(*steps)?;
                println!("{} {} units", "Moved".green(), distance.to_string().bold());
            }
            Command::Sync { top, bottom } => {
                let distance = self.system.sync_move(*top, *bottom)?;
                println!("{} {} units", "Synced".green(), distance.to_string().bold());
            }
            Command::Jaw => {
                self.jaw_released = self.system.toggle_clamp_axis(self.jaw_released)?;
                let word = if self.jaw_released { "open" } else { "closed" };
                println!("{} {}", "Jaw".green(), word.bold());
            }
            Command::Grip(device, state) => {
                match (device, state) {
                    (Device::Catheter, GripState::Clamped) => self.system.clamp_catheter()?,
                    (Device::Catheter, GripState::Released) => self.system.release_catheter()?,
                    (Device::Guidewire, GripState::Clamped) => self.system.clamp_guidewire()?,
                    (Device::Guidewire, GripState::Released) => self.system.release_guidewire()?,
                }
                println!("{} {:?}", device.to_string().green(), state);
            }
            Command::Status => self.print_status(),
            Command::Events => {
                for event in self.system.drain_events() {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => println!("{}: {}", "Serialize error".red(), e),
                    }
                }
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn print_status(&self) {
        println!();
        println!("{}", "Rig Status".bold().underline());
        for (axis, position) in self.system.assembly().positions() {
            let physical = self
                .sim
                .physical_position(&axis)
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<10} {:>8}  (sim {})", axis, position, physical.dimmed());
        }
        for device in [Device::Catheter, Device::Guidewire] {
            let state = match self.system.grip_state(device) {
                GripState::Clamped => "clamped".green(),
                GripState::Released => "released".yellow(),
            };
            println!("  {:<10} {}", device.to_string(), state);
        }
        println!("  {:<10} {}", "jaw", if self.jaw_released { "open" } else { "closed" });
        println!();
    }
}

/// Entry point for the interactive shell.
///
/// `shutdown` is polled each iteration; when set the shell exits cleanly.
pub fn run(system: &mut ClampSystem, sim: &SimRig, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = Session::new(system, sim);

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "cathrig>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(command) => {
                if let Err(e) = session.execute(&command) {
                    println!("{}: {}", "Motion fault".red().bold(), e);
                }
            }
            Err(e) => {
                println!("{} {}. Type {} for available commands.", "Error:".red(), e, "/help".bold());
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Rig Commands".bold().underline());
    println!("  {}                  – home the transports", "/home".bold().cyan());
    println!("  {}          – interlocked transport move", "/move <steps>".bold().cyan());
    println!("  {}   – synchronized top/bottom move", "/sync <top> <bottom>".bold().cyan());
    println!("  {}                   – stroke the clamp jaw", "/jaw".bold().cyan());
    println!("  {} – drive a linear clamp", "/grip <device> <clamp|release>".bold().cyan());
    println!("  {}                – positions and grips", "/status".bold().cyan());
    println!("  {}                – drain the motion journal", "/events".bold().cyan());
    println!("  {}           – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}
