mod test_scenarios;
mod test_execution;
