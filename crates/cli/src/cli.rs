use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use portal::PersistMode;

#[derive(Parser, Debug)]
#[command(name = "pie-portal")]
#[command(about = "Inject pointer and keyboard input through the RemoteDesktop portal")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Session options file (JSON)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Parent window identifier for the permission dialog (x11:XID or wayland:HANDLE)
	#[arg(long, global = true, value_name = "ID")]
	pub parent_window: Option<String>,

	/// Fail portal requests that get no response within this many milliseconds
	#[arg(long, global = true, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	/// Ask the portal to remember the grant
	#[arg(long, global = true, value_enum)]
	pub persist: Option<PersistArg>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Move the pointer by a relative offset
	#[command(allow_negative_numbers = true)]
	MoveBy { dx: f64, dy: f64 },

	/// Move the pointer to an absolute position
	#[command(allow_negative_numbers = true)]
	MoveTo {
		x: f64,
		y: f64,
		/// Current pointer position; the portal cannot report it
		#[arg(long, num_args = 2, value_names = ["CX", "CY"], required = true)]
		from: Vec<f64>,
	},

	/// Press and release a pointer button
	Click {
		/// Linux evdev button code (defaults to BTN_LEFT)
		#[arg(long, value_name = "CODE")]
		button: Option<i32>,
	},

	/// Scroll by discrete steps
	#[command(allow_negative_numbers = true)]
	Scroll {
		steps: i32,
		#[arg(long)]
		horizontal: bool,
	},

	/// Press and release a key by evdev keycode
	Key { code: i32 },

	/// Inspect configuration
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
	/// Print the effective session options as JSON
	Show,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PersistArg {
	Transient,
	Application,
	Permanent,
}

impl From<PersistArg> for PersistMode {
	fn from(arg: PersistArg) -> Self {
		match arg {
			PersistArg::Transient => PersistMode::Transient,
			PersistArg::Application => PersistMode::Application,
			PersistArg::Permanent => PersistMode::Permanent,
		}
	}
}
