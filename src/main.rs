use pipesh::{HEADLESS_FLAG, Interpreter, run_headless};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some(HEADLESS_FLAG) {
        // Pipeline-stage mode: run one builtin with this process's stdio.
        let name = args.next().unwrap_or_default();
        let rest: Vec<String> = args.collect();
        std::process::exit(run_headless(&name, &rest));
    }

    let mut shell = Interpreter::default();
    let code = shell.repl()?;
    std::process::exit(code);
}
