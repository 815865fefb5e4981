//! Structural checks over a lowered module.
//!
//! The generator is supposed to uphold these invariants by
//! construction; the verifier exists so a violation surfaces as a
//! compiler bug report instead of garbage emitted further down the
//! pipeline.

use std::collections::HashSet;
use std::fmt;

use rill_ast::SymbolId;
use smol_str::SmolStr;

use crate::{AnfModule, BlockId, CallTarget, Definition, Instruction};

#[derive(Debug, Clone)]
pub struct VerifyError {
    pub definition: SmolStr,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.definition, self.message)
    }
}

/// Check every definition:
///
/// * branch and jump targets stay inside the definition,
/// * every id an instruction reads is bound somewhere in the same
///   definition (by `receive` or as an instruction result),
/// * tail calls carry no destination and non-tail calls carry one,
/// * `receive` appears only as the first instruction of the entry
///   block.
pub fn verify_module(module: &AnfModule) -> Result<(), VerifyError> {
    for def in &module.defs {
        verify_def(def)?;
    }
    Ok(())
}

fn verify_def(def: &Definition) -> Result<(), VerifyError> {
    let mut defined: HashSet<SymbolId> = HashSet::new();
    for block in &def.blocks {
        for instr in &block.instrs {
            match instr {
                Instruction::Receive { params } => defined.extend(params.iter().copied()),
                Instruction::LoadGlobal { dst, .. }
                | Instruction::LoadConst { dst, .. }
                | Instruction::Alias { dst, .. }
                | Instruction::Call { dst: Some(dst), .. } => {
                    defined.insert(*dst);
                }
                _ => {}
            }
        }
    }

    for (index, block) in def.blocks.iter().enumerate() {
        for (pos, instr) in block.instrs.iter().enumerate() {
            match instr {
                Instruction::Receive { .. } => {
                    if index != 0 || pos != 0 {
                        return Err(error(
                            def,
                            format!("receive in the middle of block .L{index}"),
                        ));
                    }
                }
                Instruction::AdjustStack
                | Instruction::LoadGlobal { .. }
                | Instruction::LoadConst { .. } => {}
                Instruction::Call {
                    target,
                    args,
                    dst,
                    tail,
                } => {
                    if let CallTarget::Value(id) = target {
                        check_defined(def, &defined, *id, "call target")?;
                    }
                    for &arg in args {
                        check_defined(def, &defined, arg, "call argument")?;
                    }
                    match (tail, dst) {
                        (true, Some(_)) => {
                            return Err(error(def, "tail call with a result id".to_string()))
                        }
                        (false, None) => {
                            return Err(error(def, "non-tail call without a result id".to_string()))
                        }
                        _ => {}
                    }
                }
                Instruction::Alias { src, .. } => {
                    check_defined(def, &defined, *src, "alias source")?;
                }
                Instruction::Branch {
                    cond,
                    then_block,
                    else_block,
                } => {
                    check_defined(def, &defined, *cond, "branch condition")?;
                    check_target(def, *then_block)?;
                    check_target(def, *else_block)?;
                }
                Instruction::Return { value } => {
                    check_defined(def, &defined, *value, "return value")?;
                }
                Instruction::Jump { target } => check_target(def, *target)?,
                Instruction::GlobalAssign { src, .. } => {
                    check_defined(def, &defined, *src, "assigned value")?;
                }
            }
        }
    }
    Ok(())
}

fn check_defined(
    def: &Definition,
    defined: &HashSet<SymbolId>,
    id: SymbolId,
    what: &str,
) -> Result<(), VerifyError> {
    if defined.contains(&id) {
        Ok(())
    } else {
        Err(error(def, format!("{what} reads undefined id {id}")))
    }
}

fn check_target(def: &Definition, target: BlockId) -> Result<(), VerifyError> {
    if target.0 < def.blocks.len() {
        Ok(())
    } else {
        Err(error(def, format!("transfer to missing block .L{target}")))
    }
}

fn error(def: &Definition, message: String) -> VerifyError {
    VerifyError {
        definition: def.name.clone(),
        message,
    }
}
