use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;

use yeelight_control_lib::control_interface::command::{Command, Param, Reply, Response};
use yeelight_control_lib::control_interface::ControlInterface;
use yeelight_control_lib::led::color::{CliColors, Color, ColorMatrix};
use yeelight_control_lib::led::pattern::Pattern;
use yeelight_control_lib::util::config::DeviceConfig;
use yeelight_control_lib::util::traits::ResultValues;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "yeelight_control",
    about = "Controls Yeelight smart lights over the LAN control protocol",
    version
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for property queries.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Subcommand for operations that require device communication
    #[clap(name = "device-call")]
    DeviceCall {
        /// Address of the device, `host` or `host:port` (port defaults to 55443)
        #[clap(long)]
        address: String,

        /// Keep one connection open for all commands of this invocation
        #[clap(long)]
        persistent: bool,

        /// Connect and response timeout in milliseconds
        #[clap(short = 't', long = "timeout", value_parser = parse_duration, default_value = "3000")]
        timeout: Duration,

        /// Transition duration in milliseconds for set commands
        #[clap(long = "smooth", value_parser = parse_duration, default_value = "200")]
        smooth: Duration,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Prints the compact frame text for a list of hex colors, without a device.
    #[clap(name = "encode")]
    Encode {
        /// Colors as hex, e.g. `#ff0000 00ff00`
        #[clap(required = true)]
        colors: Vec<String>,
    },
}

fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let millis = s
        .parse::<u64>()
        .map_err(|_| "could not parse duration in milliseconds")?;
    Ok(Duration::from_millis(millis))
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Reads one or more properties, e.g. `power bright rgb ct`.
    #[clap(name = "get-props")]
    GetProps {
        #[clap(required = true)]
        names: Vec<String>,

        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Prints the current color as hex.
    #[clap(name = "get-color")]
    GetColor,
    /// Sets the color by name, hex value or RGB components.
    #[clap(name = "set-color")]
    SetColor {
        /// The color to display by name
        #[clap(value_enum)]
        color: Option<CliColors>,

        /// Hex color, e.g. `#ff8800`
        #[clap(long)]
        hex: Option<String>,

        /// Red component of the color (0-255)
        #[clap(short = 'r', long = "red", value_parser = clap::value_parser!(u8))]
        red: Option<u8>,

        /// Green component of the color (0-255)
        #[clap(short = 'g', long = "green", value_parser = clap::value_parser!(u8))]
        green: Option<u8>,

        /// Blue component of the color (0-255)
        #[clap(short = 'b', long = "blue", value_parser = clap::value_parser!(u8))]
        blue: Option<u8>,
    },
    /// Prints the brightness in percent.
    #[clap(name = "get-bright")]
    GetBright,
    /// Sets the brightness in percent (1-100).
    #[clap(name = "set-bright")]
    SetBright { value: u8 },
    /// Sets the white color temperature in Kelvin (1700-6500).
    #[clap(name = "set-ct")]
    SetCt { kelvin: u16 },
    /// Turns the light on.
    #[clap(name = "on")]
    On,
    /// Turns the light off.
    #[clap(name = "off")]
    Off,
    /// Toggles the power state.
    #[clap(name = "toggle")]
    Toggle,
    /// Prints whether the light is on.
    #[clap(name = "is-on")]
    IsOn,
    /// Turns the light off after the given number of minutes.
    #[clap(name = "sleep-in")]
    SleepIn { minutes: u32 },
    /// Turns the light off at a local wall-clock time (`HH:MM` or `HH:MM:SS`).
    #[clap(name = "sleep-at")]
    SleepAt { time: String },
    /// Shows a frame on an LED-matrix device.
    #[clap(name = "show-matrix")]
    ShowMatrix {
        /// Number of LEDs in the frame
        #[clap(long)]
        leds: usize,

        /// Fill the frame with one named color
        #[clap(long, value_enum)]
        color: Option<CliColors>,

        /// Spread the color wheel over the frame
        #[clap(long)]
        wheel: bool,

        /// Repeat a sequence of hex colors over the frame
        #[clap(long, num_args = 1..)]
        alternate: Vec<String>,

        /// Fade between two hex colors from the first LED to the last
        #[clap(long, num_args = 2, value_names = ["FROM", "TO"])]
        gradient: Vec<String>,

        /// Rotation of the color wheel, a fraction of a full turn
        #[clap(long, default_value_t = 0.0)]
        offset: f64,

        /// Scale every LED by this factor (0.0-1.0)
        #[clap(long)]
        dim: Option<f64>,
    },
    /// Sends an arbitrary method with a JSON array of parameters.
    #[clap(name = "raw")]
    Raw {
        method: String,

        /// Parameters as a JSON array, e.g. `'["on", "smooth", 500]'`
        #[clap(default_value = "[]")]
        params: String,
    },
}

#[derive(Serialize)]
struct Property {
    name: String,
    value: Option<String>,
}

async fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Encode { colors } => {
            let matrix: ColorMatrix = parse_colors(&colors)?.into_iter().collect();
            println!("{}", matrix.to_compact_text());
        }
        Commands::DeviceCall {
            address,
            persistent,
            timeout,
            smooth,
            action,
        } => {
            let config = DeviceConfig::default()
                .with_persistent(persistent)
                .with_timeout(timeout)
                .with_smooth(smooth);
            let mut control = ControlInterface::new(&address, config);
            let result = handle_device_action(&mut control, action).await;
            control.disconnect().await;
            result.with_context(|| format!("Command to {} failed", control.address()))?;
        }
    }

    Ok(())
}

async fn handle_device_action(control: &mut ControlInterface, action: DeviceAction) -> Result<()> {
    match action {
        DeviceAction::GetProps { names, output } => {
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let response = control.get_properties(&name_refs).await?;
            if response.is_empty() {
                bail!("No response received within {:?}", control.config().timeout);
            }
            let properties: Vec<Property> = names
                .iter()
                .enumerate()
                .map(|(index, name)| Property {
                    name: name.clone(),
                    value: response.result_str(index),
                })
                .collect();
            match output {
                OutputFormat::Plaintext => {
                    for property in &properties {
                        println!(
                            "{}: {}",
                            property.name,
                            property.value.as_deref().unwrap_or("-")
                        );
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string(&properties)?);
                }
                OutputFormat::Yaml => {
                    println!("{}", serde_yaml::to_string(&properties)?);
                }
            }
        }
        DeviceAction::GetColor => {
            println!("Current color: #{}", control.get_hex_color().await?);
        }
        DeviceAction::SetColor {
            color,
            hex,
            red,
            green,
            blue,
        } => {
            let color_to_show = match (color, hex, red, green, blue) {
                (Some(color_name), None, None, None, None) => color_name.into(),
                (None, Some(hex), None, None, None) => Color::from_hex(&hex)?,
                (None, None, Some(r), Some(g), Some(b)) => Color::from_rgb(r, g, b),
                _ => return Err(anyhow!("Invalid color specification")),
            };
            report(control.set_color(color_to_show).await?, "Color set to", &color_to_show);
        }
        DeviceAction::GetBright => {
            println!("Brightness: {}%", control.get_bright().await?);
        }
        DeviceAction::SetBright { value } => {
            report(control.set_bright(value).await?, "Brightness set to", &value);
        }
        DeviceAction::SetCt { kelvin } => {
            report(
                control.set_color_temperature(kelvin).await?,
                "Color temperature set to",
                &format!("{}K", kelvin),
            );
        }
        DeviceAction::On => report(control.set_on().await?, "Power", &"on"),
        DeviceAction::Off => report(control.set_off().await?, "Power", &"off"),
        DeviceAction::Toggle => report(control.toggle().await?, "Power", &"toggled"),
        DeviceAction::IsOn => {
            let on = control.is_on().await?;
            println!("The light is {}", if on { "on" } else { "off" });
        }
        DeviceAction::SleepIn { minutes } => {
            report(
                control.set_sleep_timer(minutes).await?,
                "Sleep timer set for minutes:",
                &minutes,
            );
        }
        DeviceAction::SleepAt { time } => {
            report(
                control.set_sleep_timer_at(&time).await?,
                "Sleep timer set for",
                &time,
            );
        }
        DeviceAction::ShowMatrix {
            leds,
            color,
            wheel,
            alternate,
            gradient,
            offset,
            dim,
        } => {
            let matrix = match (color, wheel, alternate.is_empty(), gradient.is_empty()) {
                (Some(color), false, true, true) => ColorMatrix::solid(leds, color.into()),
                (None, true, true, true) => Pattern::color_wheel(leds, offset),
                (None, false, false, true) => {
                    Pattern::alternating(leds, &parse_colors(&alternate)?)?
                }
                (None, false, true, false) => {
                    let ends = parse_colors(&gradient)?;
                    Pattern::gradient(leds, ends[0], ends[1])
                }
                _ => bail!("Pass exactly one of --color, --wheel, --alternate or --gradient"),
            };
            let matrix = match dim {
                Some(factor) => Pattern::dim(&matrix, factor),
                None => matrix,
            };
            report(
                control.show_matrix(&matrix).await?,
                "Frame sent with LEDs:",
                &matrix.len(),
            );
        }
        DeviceAction::Raw { method, params } => {
            let params: Vec<Value> =
                serde_json::from_str(&params).context("Parameters must be a JSON array")?;
            let params = params
                .into_iter()
                .map(Param::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            match control
                .send_command_outcome(Command::new(method, params))
                .await?
            {
                Reply::Answered(response) => println!("{}", serde_json::to_string(&response)?),
                Reply::TimedOut => println!("No response received"),
            }
        }
    }

    Ok(())
}

fn parse_colors(texts: &[String]) -> Result<Vec<Color>> {
    texts
        .iter()
        .map(|text| Color::from_hex(text).map_err(Into::into))
        .collect()
}

fn report(response: Response, what: &str, value: &dyn std::fmt::Display) {
    if response.is_empty() {
        println!("No acknowledgement received ({} {})", what, value);
    } else {
        println!("{} {}", what, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_device_call() {
        let cli = Cli::try_parse_from([
            "yeelight_control",
            "device-call",
            "--address",
            "192.168.1.40",
            "--timeout",
            "500",
            "set-bright",
            "40",
        ])
        .unwrap();
        match cli.command {
            Commands::DeviceCall {
                timeout,
                persistent,
                action: DeviceAction::SetBright { value },
                ..
            } => {
                assert_eq!(timeout, Duration::from_millis(500));
                assert!(!persistent);
                assert_eq!(value, 40);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_show_matrix_gradient() {
        let cli = Cli::try_parse_from([
            "yeelight_control",
            "device-call",
            "--address",
            "192.168.1.41",
            "show-matrix",
            "--leds",
            "10",
            "--gradient",
            "#ff0000",
            "0000ff",
            "--dim",
            "0.5",
        ])
        .unwrap();
        match cli.command {
            Commands::DeviceCall {
                action:
                    DeviceAction::ShowMatrix {
                        leds,
                        gradient,
                        alternate,
                        dim,
                        ..
                    },
                ..
            } => {
                assert_eq!(leds, 10);
                assert_eq!(gradient, vec!["#ff0000", "0000ff"]);
                assert!(alternate.is_empty());
                assert_eq!(dim, Some(0.5));
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_colors() {
        let colors = parse_colors(&["#ff0000".to_string(), "00ff00".to_string()]).unwrap();
        assert_eq!(colors, vec![Color::from_rgb(255, 0, 0), Color::from_rgb(0, 255, 0)]);
        assert!(parse_colors(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250"), Ok(Duration::from_millis(250)));
        assert!(parse_duration("soon").is_err());
    }
}
