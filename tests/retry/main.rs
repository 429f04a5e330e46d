//! Integration tests for the retry executor: backoff timing, retry vetoes,
//! per-attempt timeouts, failure logging and cancellation.


mod backoff;
mod cancellation;
