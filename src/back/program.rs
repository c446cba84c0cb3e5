use crate::back::insts::Instruction;

/// 汇编指令的线性累积器
pub struct AsmProgram {
    instructions: Vec<Instruction>,
}

impl AsmProgram {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    pub fn push(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub fn dump(&self) -> String {
        let mut text = self
            .instructions
            .iter()
            .map(|inst| inst.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');
        text
    }
}

impl Default for AsmProgram {
    fn default() -> Self {
        Self::new()
    }
}
