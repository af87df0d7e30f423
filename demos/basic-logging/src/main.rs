mod example_basic_logging;
mod example_channel_batching;
mod example_multithreaded_logging;
mod example_request_scoped_logging;

use crate::example_basic_logging::example_basic_logging;
use crate::example_channel_batching::example_channel_batching;
use crate::example_multithreaded_logging::example_multithreaded_logging;
use crate::example_request_scoped_logging::example_request_scoped_logging;

fn main() {
  println!("arbor examples");
  println!("==============");

  example_basic_logging();
  example_request_scoped_logging();
  example_multithreaded_logging();
  example_channel_batching();
}
