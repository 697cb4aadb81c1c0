//! Writes a synthetic device (top, left and right surface scans) as UFF files.
//!
//! Usage: `generate_sample [output-dir]` (defaults to `sample_data`).

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::PathBuf;

use anyhow::{Context, Result};
use vibroscan::data::model::{ChannelRecord, Samples};
use vibroscan::data::uff::{write_uff, UffHeader};
use vibroscan::data::Channel;

const DEVICE: &str = "Demo unit";
const GRID: usize = 3;

/// Mechanical resonance of the simulated surface.
fn resonance(f: f64, f0: f64, q: f64, amplitude: f64) -> f64 {
    let r = f / f0;
    amplitude / ((1.0 - r * r).powi(2) + (r / q).powi(2)).sqrt()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Multiplicative jitter around 1.
    fn jitter(&mut self, spread: f64) -> f64 {
        1.0 + spread * (2.0 * self.next_f64() - 1.0)
    }
}

fn axis(channel: Channel) -> (&'static str, &'static str) {
    match channel {
        Channel::Disp => ("Displacement", "m"),
        Channel::Vib => ("Velocity", "m/s"),
        Channel::Acc => ("Acceleration", "m/s^2"),
        Channel::Ref1 => ("Sound Pressure", "Pa"),
        Channel::Ref2 | Channel::Ref3 => ("Voltage", "V"),
        _ => ("Velocity / Sound Pressure", "m/s/Pa"),
    }
}

/// The eight records of one scan point.
fn point_records(
    file_name: &str,
    point: u32,
    frequencies: &[f64],
    f0: f64,
    gain: f64,
    rng: &mut SimpleRng,
) -> Vec<ChannelRecord> {
    let pressure: Vec<f64> = frequencies.iter().map(|_| 0.5 * rng.jitter(0.02)).collect();
    let velocity: Vec<f64> = frequencies
        .iter()
        .map(|&f| gain * resonance(f, f0, 8.0, 1e-4) * rng.jitter(0.05))
        .collect();

    Channel::RECORDED
        .into_iter()
        .map(|channel| {
            let y: Vec<f64> = frequencies
                .iter()
                .zip(velocity.iter().zip(&pressure))
                .map(|(&f, (&v, &p))| match channel {
                    Channel::Disp => v / (2.0 * PI * f),
                    Channel::Vib => v,
                    Channel::Acc => v * 2.0 * PI * f,
                    Channel::Ref1 => p,
                    Channel::Ref2 => 1.0,
                    Channel::Ref3 => 0.2,
                    _ => v / p,
                })
                .collect();
            let (label, unit) = axis(channel);
            ChannelRecord {
                x: frequencies.to_vec(),
                data: Samples::Real(y),
                abscissa_min: frequencies[0],
                id4: file_name.to_string(),
                id2: channel.description().to_string(),
                rsp_node: point,
                abscissa_axis_lab: "Frequency".into(),
                abscissa_axis_units_lab: "Hz".into(),
                ordinate_axis_lab: label.into(),
                ordinate_axis_units_lab: unit.into(),
            }
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);

    // 50 Hz .. 10 kHz, step 50
    let frequencies: Vec<f64> = (1..=200).map(|i| i as f64 * 50.0).collect();

    // (surface, resonance frequency, point made anomalous)
    let surfaces = [("top", 1800.0, Some(5)), ("left", 2400.0, None), ("right", 2600.0, Some(2))];

    for (surface, f0, corrupted) in surfaces {
        let file_name = format!("{DEVICE} {surface}.uff");
        let header = UffHeader {
            model_name: format!("{DEVICE} {surface}"),
            description: "Synthetic vibrometer scan".into(),
            db_app: "generate_sample".into(),
            date_db_created: "15-Oct-26".into(),
            time_db_created: "12:00:00".into(),
            units_code: Some(1),
            units_description: "SI".into(),
        };

        let mut coordinates = BTreeMap::new();
        let mut records = Vec::new();
        for row in 0..GRID {
            for col in 0..GRID {
                let point = (row * GRID + col + 1) as u32;
                coordinates.insert(point, [col as f64 * 0.002, row as f64 * 0.002, 0.0]);
                let gain = if corrupted == Some(point) { 20.0 } else { 1.0 };
                records.extend(point_records(&file_name, point, &frequencies, f0, gain, &mut rng));
            }
        }

        let path = out_dir.join(&file_name);
        write_uff(&path, &header, &coordinates, &records)?;
        println!(
            "Wrote {} scan points ({} frequencies each) to {}",
            coordinates.len(),
            frequencies.len(),
            path.display()
        );
    }
    Ok(())
}
