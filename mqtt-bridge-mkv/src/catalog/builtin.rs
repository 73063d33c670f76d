//! Built-in register tables for the supported Mk5s Touch controller variants.

use super::{Encoding, FieldDescriptor, RegisterDescriptor};
use crate::formula::Formula;

const RUNNING_HOURS: &str = "3007.01";

fn temperature(id: &str, name: &str) -> RegisterDescriptor {
    RegisterDescriptor::single(id, name, "°C", Encoding::HiU16, Formula::Divide(10.0))
}

fn pressure(id: &str, name: &str) -> RegisterDescriptor {
    RegisterDescriptor::single(id, name, "bar", Encoding::HiU16, Formula::Divide(1000.0))
}

fn hours(id: &str, name: &str) -> RegisterDescriptor {
    RegisterDescriptor::single(id, name, "h", Encoding::UInt32, Formula::Divide(3600.0))
}

fn counter(id: &str, name: &str) -> RegisterDescriptor {
    RegisterDescriptor::single(id, name, "count", Encoding::UInt32, Formula::Identity)
}

fn amperage(id: &str, name: &str) -> RegisterDescriptor {
    RegisterDescriptor::single(id, name, "A", Encoding::HiU16, Formula::Identity)
}

/// Requested speed in the low half, actual speed in the high half.
fn speeds(id: &str, motor: &str) -> RegisterDescriptor {
    RegisterDescriptor::composite(
        id,
        vec![
            FieldDescriptor::new(
                &format!("{} requested rpm", motor),
                "rpm",
                Encoding::LoU16,
                Formula::Identity,
            ),
            FieldDescriptor::new(
                &format!("{} actual rpm", motor),
                "rpm",
                Encoding::HiU16,
                Formula::Identity,
            ),
        ],
    )
}

/// Share of running hours spent in each VSD speed band, 3007.05 - 3007.09.
fn vsd_bands() -> Vec<RegisterDescriptor> {
    [
        ("3007.05", "VSD 1-20"),
        ("3007.06", "VSD 20-40"),
        ("3007.07", "VSD 40-60"),
        ("3007.08", "VSD 60-80"),
        ("3007.09", "VSD 80-100"),
    ]
    .into_iter()
    .map(|(id, name)| {
        RegisterDescriptor::single(
            id,
            name,
            "%",
            Encoding::UInt32,
            Formula::ratio(RUNNING_HOURS, 100.0),
        )
    })
    .collect()
}

fn flow() -> RegisterDescriptor {
    RegisterDescriptor::single("3021.05", "Flow", "%", Encoding::UInt32, Formula::Identity)
}

fn accumulated_volume() -> RegisterDescriptor {
    RegisterDescriptor::single(
        "3007.0C",
        "Accumulated Volume",
        "m3",
        Encoding::UInt32,
        Formula::Multiply(1000.0),
    )
}

fn machine_status(id: &str) -> RegisterDescriptor {
    RegisterDescriptor::single(id, "Machine Status", "code", Encoding::UInt32, Formula::Identity)
}

pub(super) fn ga15vp13() -> Vec<RegisterDescriptor> {
    let mut table = vec![
        pressure("3002.01", "Compressor Outlet"),
        temperature("3002.03", "Element Outlet"),
        temperature("3002.05", "Ambient Air"),
        temperature("3002.08", "Controller Temperature"),
        speeds("3021.01", "Motor"),
        hours(RUNNING_HOURS, "Running Hours"),
        counter("3007.03", "Motor Starts"),
        counter("3007.04", "Load Relay"),
    ];
    table.extend(vsd_bands());
    table.extend([
        counter("3007.0B", "Fan Starts"),
        accumulated_volume(),
        hours("3007.0D", "Module Hours"),
        counter("3007.0E", "Emergency Stops"),
        counter("3007.0F", "Direct Stops"),
        counter("3007.14", "Recirculation Starts"),
        counter("3007.15", "Recirculation Failures"),
        hours("3007.18", "Low Load Hours"),
        hours("3007.22", "Available Hours"),
        hours("3007.23", "Unavailable Hours"),
        hours("3007.24", "Emergency Stop Hours"),
        flow(),
        amperage("3021.0A", "Motor amperage"),
        hours("3113.50", "Service A 1"),
        hours("3113.51", "Service A 2"),
        hours("3113.52", "Service B 1"),
        hours("3113.53", "Service B 2"),
        machine_status("3113.54"),
    ]);
    table
}

pub(super) fn ga15vs23a() -> Vec<RegisterDescriptor> {
    let mut table = vec![
        temperature("3002.01", "Controller Temperature"),
        pressure("3002.24", "Compressor Outlet"),
        temperature("3002.26", "Ambient Air"),
        RegisterDescriptor::single("3002.27", "Relative Humidity", "%", Encoding::HiU16, Formula::Identity),
        temperature("3002.2A", "Element Outlet"),
        temperature("3002.66", "Aftercooler drain PCB Temperature"),
        speeds("3021.01", "Motor"),
        speeds("3022.01", "Fan Motor"),
        hours(RUNNING_HOURS, "Running Hours"),
        counter("3007.03", "Motor Starts"),
        counter("3007.04", "Load Relay"),
    ];
    table.extend(vsd_bands());
    table.extend([
        counter("3007.0B", "Fan Starts"),
        accumulated_volume(),
        hours("3007.0D", "Module Hours"),
        counter("3007.0E", "Emergency Stops"),
        counter("3007.0F", "Direct Stops"),
        counter("3007.17", "Recirculation Starts"),
        counter("3007.18", "Recirculation Failures"),
        hours("3007.1B", "Low Load Hours"),
        hours("3007.25", "Available Hours"),
        hours("3007.26", "Unavailable Hours"),
        hours("3007.27", "Emergency Stop Hours"),
        hours("3007.43", "Display Hours"),
        hours("3007.4C", "Boostflow Hours"),
        counter("3007.4D", "Boostflow Activations"),
        counter("3007.54", "Emergency Stops During Running"),
        hours("3007.55", "Drain 1 Operation Time"),
        counter("3007.56", "Drain 1 number of switching actions"),
        counter("3007.57", "Drain 1 number of manual drainings"),
        flow(),
        amperage("3021.0A", "Motor amperage"),
        amperage("3022.0A", "Fan Motor amperage"),
        hours("3113.50", "Service A 1"),
        hours("3113.51", "Service A 2"),
        hours("3113.52", "Service B 1"),
        hours("3113.53", "Service B 2"),
        hours("3113.54", "Service D 1"),
        hours("3113.55", "Service D 2"),
        machine_status("3113.56"),
    ]);
    table
}
