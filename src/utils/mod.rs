pub mod graceful_shutdown;
