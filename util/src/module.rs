//! Cyclic module interface
//!
//! Modules executed once per control cycle implement [`State`]. Initialisation is separate from
//! construction so a module can be created with `Default` and configured from a parameter file
//! later. Processing takes all of its inputs explicitly and returns its outputs, along with a
//! status report destined for telemetry.

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// The module's internal state.
pub trait State {
    /// Configuration given to `init`
    type InitData;
    /// Reason `init` can fail
    type InitError;

    /// Inputs of one cycle
    type InputData;
    /// Outputs of one cycle
    type OutputData;
    /// Diagnostics of one cycle
    type StatusReport;
    /// Reason a cycle can fail
    type ProcError;

    /// Configure the module. Calling `proc` before a successful `init` is an error.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError>;

    /// Execute one cycle.
    ///
    /// A failed cycle produces no output, leaving the caller to decide what to command instead.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
