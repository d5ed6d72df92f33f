use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use dashmap::DashMap;
use crate::bytecode::{Parser, Program};
use crate::vm::{Frame, Value, VM};
use crate::runtime::{RuntimeConfig, RuntimeError, RuntimeResult};

/// The Runtime is the main entry point for using the bytecode VM
#[derive(Clone)]
pub struct Runtime {
    vm: VM,
    programs: Arc<DashMap<String, Arc<Program>>>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> RuntimeResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> RuntimeResult<Self> {
        let mut vm = VM::new();
        vm.set_stack_trace(config.stack_trace);

        Ok(Self {
            vm,
            programs: Arc::new(DashMap::new()),
            config,
        })
    }

    /// Send PRINT output to `writer` instead of stdout
    pub fn with_output<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        let mut vm = VM::with_output(writer);
        vm.set_stack_trace(self.config.stack_trace);
        self.vm = vm;
        self
    }

    /// Register a program under its name, replacing any earlier one
    pub fn load_program(&self, program: Program) {
        if self.config.debug_mode {
            println!("Loaded program: {}", program.name);
            println!("Instructions: {}", program.len());
        }
        self.programs.insert(program.name.clone(), Arc::new(program));
    }

    pub fn has_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Execute a program against a fresh frame
    pub fn execute(&self, program: &Program) -> RuntimeResult<Value> {
        if self.config.debug_mode {
            println!("Executing program: {}", program.name);
        }

        let mut frame = Frame::new();
        let result = self.vm.execute(program, &mut frame);
        self.vm.flush()?;

        let value = result?;
        if self.config.debug_mode {
            println!("Program {} returned: {:?}", program.name, value);
        }
        Ok(value)
    }

    /// Execute a registered program by name
    pub fn execute_program(&self, name: &str) -> RuntimeResult<Value> {
        let program = self.program(name)?;
        self.execute(&program)
    }

    /// Execute a bytecode file and return the result
    pub fn execute_file<P: AsRef<Path>>(&self, path: P) -> RuntimeResult<Value> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let program = Parser::parse(&mut reader)?;

        let name = program.name.clone();
        self.load_program(program);
        self.execute_program(&name)
    }

    /// Execute several registered programs concurrently, one thread and one
    /// frame each. Results come back in the order the names were given.
    pub fn execute_all(&self, names: &[&str]) -> RuntimeResult<Vec<Value>> {
        let programs = names
            .iter()
            .map(|name| self.program(name))
            .collect::<RuntimeResult<Vec<_>>>()?;

        let vm = &self.vm;
        let results = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = programs
                .iter()
                .map(|program| {
                    let handle = scope.spawn(move |_| {
                        let mut frame = Frame::new();
                        vm.execute(program, &mut frame)
                    });
                    (program.name.as_str(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| match handle.join() {
                    Ok(result) => result.map_err(RuntimeError::from),
                    Err(_) => Err(RuntimeError::ExecutionPanicked(name.to_string())),
                })
                .collect::<RuntimeResult<Vec<Value>>>()
        })
        .map_err(|_| RuntimeError::ExecutionPanicked(names.join(", ")))?;

        self.vm.flush()?;
        results
    }

    fn program(&self, name: &str) -> RuntimeResult<Arc<Program>> {
        self.programs
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::ProgramNotFound(name.to_string()))
    }
}
