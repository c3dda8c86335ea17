use crate::stored_object;

stored_object!(MemoryUsage, "memory_usage", {
    run_id: String,
    memory_item_id: String,
    influence_score: f64,
    applied: bool,
    reason: String
});
