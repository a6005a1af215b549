// Asteroid scanner library
// Minesweeper for a Raspberry Pi with push buttons and a framebuffer,
// or for a desktop terminal; boards are always solvable without guessing

pub mod asc_app;         // Main loop and shared context
pub mod asc_assets;      // Images, fonts and localized strings
pub mod asc_cli;         // Command line arguments
pub mod asc_color;       // Theme colors for terminal and framebuffer
pub mod asc_config;      // User configuration
pub mod asc_debugger;    // Board generation visualizer
pub mod asc_error;       // Error types
pub mod asc_framebuffer; // Framebuffer renderer
pub mod asc_game;        // Minefield rules
pub mod asc_input;       // Keyboard and GPIO input
pub mod asc_render;      // Renderer trait, terminal and headless renderers
pub mod asc_solver;      // Deduction engine
pub mod asc_view;        // Start, game and end screens
