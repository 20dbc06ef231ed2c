compute::criterion_benchmark!(compute_distributed);
