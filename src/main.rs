use pith::{Runtime, VERSION};
use pith::bytecode::disassemble;
use pith::runtime::RuntimeConfig;
use pith::utils::{generate_demo_program, write_bytecode};
use std::path::Path;

fn main() {
    println!("Pith Bytecode Runtime v{}", VERSION);

    // Create demo bytecode file
    let demo_path = Path::new("demo.pith");
    let demo_program = generate_demo_program();
    match write_bytecode(&demo_program, demo_path) {
        Ok(_) => println!("Created demo bytecode file: demo.pith"),
        Err(e) => {
            eprintln!("Failed to create demo bytecode file: {}", e);
            return;
        }
    }

    println!("\n{}", disassemble(&demo_program));

    let trace = std::env::args().any(|arg| arg == "--trace");
    let runtime = match Runtime::with_config(
        RuntimeConfig::default()
            .with_debug_mode(true)
            .with_stack_trace(trace),
    ) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to initialize the runtime: {}", e);
            return;
        }
    };

    println!("Executing demo.pith...\n");
    match runtime.execute_file(demo_path) {
        Ok(result) => println!("\nExecution completed with result: {}", result),
        Err(e) => eprintln!("\nExecution failed: {}", e),
    }
}
