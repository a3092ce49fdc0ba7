// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod simulation_deadlock;
mod simulation_failure;
mod simulation_ordering;
mod simulation_termination;
