//! Truth tables for custom gates.
//!
//! A table is derived by exhaustively driving every input combination into
//! a fresh copy of the nested circuit. It is a documentation view only; the
//! engine never evaluates custom gates through it.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::executor::{EvalContext, EvalError};
use crate::gate::CustomGate;
use crate::gates::custom;
use crate::types::GateId;

/// Largest input count for which a table is derived (65536 rows).
pub const MAX_TABLE_INPUTS: usize = 16;

#[derive(Error, Debug)]
pub enum TruthTableError {
    #[error("{inputs} inputs exceed the truth table limit of {limit}")]
    TooManyInputs { inputs: usize, limit: usize },

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// One input combination and the outputs it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthRow {
    pub inputs: Vec<bool>,
    pub outputs: Vec<bool>,
}

/// An exhaustive input/output table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthTable {
    /// Custom gate name
    pub name: String,
    /// Column names for inputs, in slot order
    pub input_names: Vec<String>,
    /// Column names for outputs, in slot order
    pub output_names: Vec<String>,
    /// Rows in counting order; the first input is the most significant bit
    pub rows: Vec<TruthRow>,
}

impl TruthTable {
    /// Derives the truth table of `gate`.
    pub fn derive(gate: &CustomGate, config: &EngineConfig) -> Result<Self, TruthTableError> {
        let inputs = gate.input_gates();
        let outputs = gate.output_gates();
        let n = inputs.len();
        if n > MAX_TABLE_INPUTS {
            return Err(TruthTableError::TooManyInputs {
                inputs: n,
                limit: MAX_TABLE_INPUTS,
            });
        }

        let ctx = EvalContext::new(0, config.strategy, config.max_iterations);
        let row = |index: usize| -> Result<TruthRow, EvalError> {
            let values: Vec<bool> = (0..n).map(|k| (index >> (n - 1 - k)) & 1 == 1).collect();
            let computed = custom::evaluate(gate, &values, &ctx)?;
            if !computed.settled {
                tracing::debug!(name = %gate.name, row = index, "Truth table row did not settle");
            }
            Ok(TruthRow {
                inputs: values,
                outputs: computed.outputs,
            })
        };

        let count = 1usize << n;

        #[cfg(feature = "parallel")]
        let rows = (0..count)
            .into_par_iter()
            .map(row)
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(not(feature = "parallel"))]
        let rows = (0..count).map(row).collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(name = %gate.name, inputs = n, rows = rows.len(), "Derived truth table");

        Ok(Self {
            name: gate.name.clone(),
            input_names: column_names(gate, &inputs, "IN"),
            output_names: column_names(gate, &outputs, "OUT"),
            rows,
        })
    }

    /// Outputs for a given input combination.
    pub fn lookup(&self, inputs: &[bool]) -> Option<&[bool]> {
        self.rows
            .iter()
            .find(|row| row.inputs == inputs)
            .map(|row| row.outputs.as_slice())
    }

    /// Renders the table as CSV with a header row and 0/1 cells.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        let header: Vec<&str> = self
            .input_names
            .iter()
            .chain(&self.output_names)
            .map(String::as_str)
            .collect();
        csv.push_str(&header.join(","));
        csv.push('\n');

        for row in &self.rows {
            let cells: Vec<&str> = row
                .inputs
                .iter()
                .chain(&row.outputs)
                .map(|&v| if v { "1" } else { "0" })
                .collect();
            csv.push_str(&cells.join(","));
            csv.push('\n');
        }
        csv
    }
}

fn column_names(gate: &CustomGate, ids: &[GateId], prefix: &str) -> Vec<String> {
    ids.iter()
        .enumerate()
        .map(|(slot, id)| {
            gate.circuit
                .gate(*id)
                .and_then(|g| g.label.clone())
                .unwrap_or_else(|| format!("{}{}", prefix, slot))
        })
        .collect()
}

impl fmt::Display for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = |f: &mut fmt::Formatter<'_>, names: &[String], values: &[bool]| -> fmt::Result {
            for (name, &value) in names.iter().zip(values) {
                write!(f, " {:>width$}", if value { 1 } else { 0 }, width = name.len())?;
            }
            Ok(())
        };

        for name in &self.input_names {
            write!(f, " {}", name)?;
        }
        write!(f, " |")?;
        for name in &self.output_names {
            write!(f, " {}", name)?;
        }
        writeln!(f)?;

        for row in &self.rows {
            cell(f, &self.input_names, &row.inputs)?;
            write!(f, " |")?;
            cell(f, &self.output_names, &row.outputs)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
