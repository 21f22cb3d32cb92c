use simple_collectives::{launch, Communicator, Config, RankMain, Result, Transport};

struct Greetings;

impl RankMain for Greetings {
    fn run<T: Transport>(&self, comm: &Communicator<T>) -> Result<()> {
        // Every rank but 0 sends a greeting to rank 0
        if comm.rank() != 0 {
            let message = format!("Greetings from process {}", comm.rank());
            comm.send(&message, 0, 0)?;
        } else {
            for source in 1..comm.size() {
                let message: String = comm.recv(source, 0)?;
                println!("{}", message);
            }
        }

        // The same exchange as a single collective
        let message = format!("Hello again from process {}", comm.rank());
        if let Some(all) = comm.gather(&message, 0)? {
            for line in all {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    launch(Config::from_env()?, &Greetings)
}
