use cascade_di::{InjectError, InjectFn, Injector, Provided, value};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    let username = std::env::args()
        .nth(1)
        .expect("expected username")
        .to_string();

    let injector = Injector::new();
    // The username arrives asynchronously; every handler awaits the same
    // shared lookup.
    injector.register_provided(
        "username",
        Provided::future_value(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            username
        }),
    );
    injector.factory(
        "prompt",
        InjectFn::new_async("make_prompt(username)", |call| async move {
            let username = call
                .arg::<String>(0)
                .ok_or_else(|| InjectError::failure("username missing"))?;
            Ok(Some(value(format!("[{username}]"))))
        }),
    );

    let print_line = InjectFn::new_async("print_line(prompt)", |call| async move {
        let prompt = call
            .arg::<String>(0)
            .ok_or_else(|| InjectError::failure("prompt missing"))?;
        let message = call
            .arg::<String>(1)
            .ok_or_else(|| InjectError::failure("message missing"))?;
        println!("{prompt} {message}");
        Ok(None)
    });

    let mut stdin = BufReader::new(tokio::io::stdin());
    loop {
        let mut buf = String::new();
        stdin.read_line(&mut buf).await.unwrap();
        let buf = buf.trim();

        let split = buf.split(" ").collect::<Vec<_>>();
        let operand = split[0];

        match operand {
            "print" | "p" => {
                let message = split[1].to_string();
                injector
                    .call(&print_line, None, vec![Some(value(message))])
                    .await
                    .unwrap();
            }
            "loop" | "l" => {
                let count: usize = split[1].parse().unwrap();
                let message = split[2].to_string();
                let bound = injector.bind(&print_line, None, Vec::new());
                for _ in 0..count {
                    bound
                        .invoke(vec![Some(value(message.clone()))])
                        .await
                        .unwrap();
                }
            }
            "quit" | "q" => {
                let message = "quitting".to_string();
                injector
                    .call(&print_line, None, vec![Some(value(message))])
                    .await
                    .unwrap();
                std::process::exit(0);
            }
            other => {
                println!("unrecognized command {other}");
            }
        }
    }
}
