// Line-at-a-time REPL using editline

use editline::{LineEditor, terminals::StdioTerminal};
use forj_core::builtins::{self, BUILTINS};
use forj_core::{Config, Interpreter, StdoutOutput};
use std::io::Write;

pub fn run_repl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!(" ___            _ ");
    println!("| __|__ _ _    (_)");
    println!("| _/ _ \\ '_|   | |");
    println!("|_|\\___/_|    _/ | v{}", env!("CARGO_PKG_VERSION"));
    println!("             |__/ ");
    println!();
    println!("Type `quit` or press Ctrl-D to exit");
    println!("Type `stack` to see the current stack");
    println!("Type `clear` to clear the stack");
    println!("Type `words` to see the builtins");
    println!("Type `help <word>` to get help for a builtin");
    println!();

    let mut interp = Interpreter::with_config(config)?;
    interp.set_output(Box::new(StdoutOutput::new()));

    let mut editor = LineEditor::new(1024, 50);
    let mut terminal = StdioTerminal::new();

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        match editor.read_line(&mut terminal) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed {
                    "quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    "stack" => {
                        show_stack(&interp);
                        continue;
                    }
                    "clear" => {
                        interp.clear_stack();
                        continue;
                    }
                    "words" => {
                        let names: Vec<&str> = BUILTINS.iter().map(|b| b.name).collect();
                        println!("{}", names.join(" "));
                        continue;
                    }
                    _ => {}
                }
                if let Some(word) = trimmed.strip_prefix("help ") {
                    match builtins::lookup(word.trim()) {
                        Some(op) => println!("{}", op.builtin().doc),
                        None => println!("No builtin named '{}'", word.trim()),
                    }
                    continue;
                }

                eval_line(&mut interp, trimmed);
            }
            Err(editline::Error::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(editline::Error::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

// Run one line on the main thread, then let detached threads catch up
fn eval_line(interp: &mut Interpreter, line: &str) {
    let outcome = interp.execute_string(line).and_then(|diagnostics| {
        for d in &diagnostics {
            eprintln!("Warning: {}", d);
        }
        interp.run_until_idle()
    });
    match outcome {
        Ok(0) => {}
        Ok(stuck) => eprintln!("Warning: {} threads are blocked", stuck),
        Err(e) => eprintln!("Error: {}", e),
    }
    show_stack(interp);
}

fn show_stack(interp: &Interpreter) {
    let stack = interp.stack_text();
    if !stack.is_empty() {
        println!("Stack: {}", stack.join(" "));
    }
}
