use std::sync::mpsc;

/// Run `f` over `items` on scoped worker threads, with at most `limit` items
/// in flight at once.
///
/// Returns `(input_index, result)` pairs in completion-arrival order, which
/// is nondeterministic within a batch. Callers that care about input order
/// can sort by the index; callers that want arrival order (the resolver)
/// consume the vector as-is.
pub(crate) fn parallel_map<T, R, F>(items: Vec<T>, limit: usize, f: F) -> Vec<(usize, R)>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let limit = limit.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut remaining: Vec<(usize, T)> = items.into_iter().enumerate().collect();

    while !remaining.is_empty() {
        let take = limit.min(remaining.len());
        let batch: Vec<(usize, T)> = remaining.drain(..take).collect();

        let (tx, rx) = mpsc::channel();
        std::thread::scope(|scope| {
            for (index, item) in batch {
                let tx = tx.clone();
                let f = &f;
                scope.spawn(move || {
                    let _ = tx.send((index, f(item)));
                });
            }
            drop(tx);
            for pair in rx {
                results.push(pair);
            }
        });
    }

    results
}
