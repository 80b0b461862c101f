//! Tests for fan-out completion and emit callbacks

#[cfg(test)]
mod tests {
    use crate::emitter::tests::support::{complete_next, parking};
    use crate::emitter::{AsyncHandler, Completion, Emitter, EmitterError, Listener, Message};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;
    use tokio::time::{sleep, timeout, Duration};

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl AsyncHandler for Counter {
        async fn handle(&self, _message: Arc<Message>) {
            sleep(Duration::from_millis(5)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_callback_waits_for_every_listener() {
        let emitter = Emitter::new();
        let (first, first_parked) = parking();
        let (second, second_parked) = parking();
        emitter.on("hello world", &first).unwrap();
        emitter.on("hello world", &second).unwrap();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        emitter.emit_then(Message::new("hello world"), move |result| {
            assert!(result.is_ok());
            flag.store(true, Ordering::SeqCst);
        });

        assert_eq!(first_parked.lock().unwrap().len(), 1);
        assert_eq!(second_parked.lock().unwrap().len(), 1);
        assert_eq!(emitter.current(), 1);

        complete_next(&first_parked);
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(emitter.current(), 1);

        complete_next(&second_parked);
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(emitter.current(), 0);
    }

    #[test]
    fn test_single_listener_completion_finishes_dispatch() {
        let emitter = Emitter::new();
        let (listener, parked) = parking();
        emitter.on("one", &listener).unwrap();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        emitter.emit_then(Message::new("one"), move |_| flag.store(true, Ordering::SeqCst));

        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(parked.lock().unwrap()[0].topic(), "one");

        complete_next(&parked);
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(emitter.current(), 0);
    }

    #[test]
    fn test_callback_without_listeners_runs_while_slot_held() {
        let emitter = Emitter::new();
        let observer = emitter.clone();
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);

        emitter.emit_then(Message::new("nobody"), move |result| {
            *sink.lock().unwrap() = Some((result, observer.current()));
        });

        assert_eq!(*observed.lock().unwrap(), Some((Ok(()), 1)));
        assert_eq!(emitter.current(), 0);
    }

    #[test]
    fn test_listeners_share_one_message() {
        let emitter = Emitter::new();
        let seen: Arc<Mutex<Vec<Arc<Message>>>> = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let sink = Arc::clone(&seen);
            let listener = Listener::new(move |message: Arc<Message>, done: Completion| {
                sink.lock().unwrap().push(message);
                done.complete();
            });
            emitter.on("shared", &listener).unwrap();
        }

        emitter.emit(Message::new("shared")).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(Arc::ptr_eq(&seen[0], &seen[1]));
    }

    #[tokio::test]
    async fn test_publish_waits_for_async_listeners() {
        let emitter = Emitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let slow = Listener::from_future_fn(move |_message: Arc<Message>| {
            let counter = Arc::clone(&counter);
            async move {
                sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        emitter.on("jobs/+", &slow).unwrap();
        emitter
            .on("jobs/#", &Listener::from_async(Counter(Arc::clone(&count))))
            .unwrap();

        emitter.publish(Message::new("jobs/1")).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.current(), 0);
    }

    #[tokio::test]
    async fn test_completion_from_spawned_task() {
        let emitter = Emitter::new();
        let listener = Listener::new(|_message: Arc<Message>, done: Completion| {
            tokio::spawn(async move {
                sleep(Duration::from_millis(5)).await;
                done.complete();
            });
        });
        emitter.on("later", &listener).unwrap();

        let result = timeout(Duration::from_secs(1), emitter.publish(Message::new("later"))).await;
        assert_eq!(result, Ok(Ok(())));
    }

    #[tokio::test]
    async fn test_dropped_completion_abandons_publish() {
        let emitter = Emitter::builder().concurrency(1).build().unwrap();
        let listener = Listener::new(|_message: Arc<Message>, done: Completion| drop(done));
        emitter.on("lost", &listener).unwrap();

        let result = emitter.publish(Message::new("lost")).await;
        assert_eq!(
            result,
            Err(EmitterError::Abandoned {
                topic: "lost".to_string()
            })
        );
        // the slot stays held
        assert_eq!(emitter.current(), 1);
    }

    #[tokio::test]
    async fn test_partially_dropped_fan_out_never_calls_back() {
        let emitter = Emitter::new();
        let (parked_listener, parked) = parking();
        let dropping = Listener::new(|_message: Arc<Message>, done: Completion| drop(done));
        emitter.on("split", &parked_listener).unwrap();
        emitter.on("split", &dropping).unwrap();

        let (tx, rx) = oneshot::channel();
        emitter.emit_then(Message::new("split"), move |result| {
            let _ = tx.send(result);
        });

        complete_next(&parked);
        // the callback is released unrun once no completion remains
        assert!(rx.await.is_err());
        assert_eq!(emitter.current(), 1);
    }
}
