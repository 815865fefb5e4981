//! Dead code elimination over the lowered module.

use std::collections::HashMap;

use rill_ast::SymbolId;

use crate::{AnfModule, Instruction};

/// Delete instructions whose result nobody reads.
///
/// Only pure, non-transfer instructions are candidates: loads and
/// aliases. Deleting an alias releases its source, which can strand
/// the instruction that produced it, so the sweep repeats until a full
/// pass deletes nothing. The counts are updated in place and stay
/// accurate for the surviving code.
pub fn eliminate_dead_code(module: &mut AnfModule, ref_counts: &mut HashMap<SymbolId, u32>) {
    loop {
        let mut deleted = false;
        for def in &mut module.defs {
            for block in &mut def.blocks {
                block.instrs.retain(|instr| {
                    if !removable(instr, ref_counts) {
                        return true;
                    }
                    release_operands(instr, ref_counts);
                    deleted = true;
                    false
                });
            }
        }
        if !deleted {
            break;
        }
    }
}

fn removable(instr: &Instruction, ref_counts: &HashMap<SymbolId, u32>) -> bool {
    let dst = match instr {
        Instruction::LoadGlobal { dst, .. }
        | Instruction::LoadConst { dst, .. }
        | Instruction::Alias { dst, .. } => *dst,
        _ => return false,
    };
    ref_counts.get(&dst).copied().unwrap_or(0) == 0
}

fn release_operands(instr: &Instruction, ref_counts: &mut HashMap<SymbolId, u32>) {
    if let Instruction::Alias { src, .. } = instr {
        if let Some(count) = ref_counts.get_mut(src) {
            *count = count.saturating_sub(1);
        }
    }
}
