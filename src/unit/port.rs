//! Route descriptors for processing units.
//!
//! Each unit kind declares its routes via a static `PortDescriptor` array.
//! The host handle uses these to refuse messages for routes a kind lacks.

/// The message class carried by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Configuration updates (rule payloads).
    Rule,
    /// Configuration queries (reply destinations).
    Query,
    /// Data input messages.
    Data,
    /// The one-shot shutdown signal.
    Quit,
    /// Broadcast output records.
    Broadcast,
}

/// Whether a route is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a unit's route.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
    pub kind: PortKind,
}

impl PortDescriptor {
    pub const fn input(name: &'static str, kind: PortKind) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            kind,
        }
    }

    pub const fn output(name: &'static str, kind: PortKind) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            kind,
        }
    }
}

/// Returns true if `ports` declares an input route of `kind`.
pub fn has_input(ports: &[PortDescriptor], kind: PortKind) -> bool {
    ports
        .iter()
        .any(|p| p.direction == PortDirection::Input && p.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    static PORTS: &[PortDescriptor] = &[
        PortDescriptor::input("in", PortKind::Data),
        PortDescriptor::input("quit", PortKind::Quit),
        PortDescriptor::output("out", PortKind::Broadcast),
    ];

    #[test]
    fn test_has_input() {
        assert!(has_input(PORTS, PortKind::Data));
        assert!(has_input(PORTS, PortKind::Quit));
        assert!(!has_input(PORTS, PortKind::Rule));
        // Broadcast is declared, but as an output
        assert!(!has_input(PORTS, PortKind::Broadcast));
    }
}
