mod close;
mod cycles;
mod migrations;
