use std::io::{BufRead, BufReader};

use cascade_di::{InjectError, InjectFn, Injector, value};
use futures::executor::block_on;

fn main() {
    let username = std::env::args()
        .nth(1)
        .expect("expected username")
        .to_string();

    let injector = Injector::new();
    injector.register("username", username);

    let print_line = InjectFn::new("print_line(username)", |call| {
        let username = call
            .arg::<String>(0)
            .ok_or_else(|| InjectError::failure("username missing"))?;
        let message = call
            .arg::<String>(1)
            .ok_or_else(|| InjectError::failure("message missing"))?;
        println!("[{username}] {message}");
        Ok(None)
    });

    let mut stdin = BufReader::new(std::io::stdin());
    loop {
        let mut buf = String::new();
        stdin.read_line(&mut buf).unwrap();
        let buf = buf.trim();

        let split = buf.split(" ").collect::<Vec<_>>();
        let operand = split[0];

        match operand {
            "print" | "p" => {
                let message = split[1].to_string();
                block_on(injector.call(&print_line, None, vec![Some(value(message))])).unwrap();
            }
            "loop" | "l" => {
                let count: usize = split[1].parse().unwrap();
                let message = split[2].to_string();
                let bound = injector.bind(&print_line, None, Vec::new());
                for _ in 0..count {
                    block_on(bound.invoke(vec![Some(value(message.clone()))])).unwrap();
                }
            }
            "quit" | "q" => {
                let message = "quitting".to_string();
                block_on(injector.call(&print_line, None, vec![Some(value(message))])).unwrap();
                std::process::exit(0);
            }
            other => {
                println!("unrecognized command {other}");
            }
        }
    }
}
